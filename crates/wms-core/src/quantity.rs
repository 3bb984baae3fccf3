//! 數量精度

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 數量捨入精度（依物料計量單位）
///
/// 所有數量比較與拆分都必須顯式傳入精度，不使用全域預設值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounding {
    /// 最小計量單位，例如 1、0.01
    pub step: Decimal,
}

impl Rounding {
    /// 創建新的精度
    pub fn new(step: Decimal) -> Self {
        let step = if step > Decimal::ZERO {
            step
        } else {
            Decimal::ONE
        };
        Self { step }
    }

    /// 整數單位
    pub fn unit() -> Self {
        Self::new(Decimal::ONE)
    }

    /// 四捨五入（半數進位）到精度
    pub fn round(&self, quantity: Decimal) -> Decimal {
        let steps = (quantity / self.step)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        (steps * self.step).normalize()
    }

    /// 無條件進位到精度
    pub fn round_up(&self, quantity: Decimal) -> Decimal {
        let steps =
            (quantity / self.step).round_dp_with_strategy(0, RoundingStrategy::AwayFromZero);
        (steps * self.step).normalize()
    }

    /// 在精度下比較兩個數量
    pub fn compare(&self, a: Decimal, b: Decimal) -> Ordering {
        let diff = self.round(a - b);
        diff.cmp(&Decimal::ZERO)
    }

    /// 在精度下是否為零
    pub fn is_zero(&self, quantity: Decimal) -> bool {
        self.round(quantity).is_zero()
    }

    pub fn less_than(&self, a: Decimal, b: Decimal) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    pub fn at_least(&self, a: Decimal, b: Decimal) -> bool {
        self.compare(a, b) != Ordering::Less
    }

    pub fn equals(&self, a: Decimal, b: Decimal) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

impl Default for Rounding {
    fn default() -> Self {
        Self::unit()
    }
}
