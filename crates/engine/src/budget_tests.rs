// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn limits(soft: Option<u64>, hard: Option<u64>) -> BudgetLimits {
    BudgetLimits { soft_limit_tokens: soft, hard_limit_tokens: hard }
}

#[parameterized(
    no_limits = { 1_000_000, None, None, BudgetVerdict::Within },
    under_both = { 100, Some(1_000), Some(10_000), BudgetVerdict::Within },
    at_soft = { 1_000, Some(1_000), Some(10_000), BudgetVerdict::Within },
    over_soft = { 1_001, Some(1_000), Some(10_000), BudgetVerdict::SoftExceeded },
    at_hard = { 10_000, Some(1_000), Some(10_000), BudgetVerdict::SoftExceeded },
    over_hard = { 10_001, Some(1_000), Some(10_000), BudgetVerdict::HardExceeded },
    hard_only = { 50, None, Some(40), BudgetVerdict::HardExceeded },
    soft_only = { 50, Some(40), None, BudgetVerdict::SoftExceeded },
)]
fn verdicts(total: u64, soft: Option<u64>, hard: Option<u64>, expected: BudgetVerdict) {
    assert_eq!(evaluate_budget(total, &limits(soft, hard)), expected);
}
