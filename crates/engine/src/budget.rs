//! Budget metrics derived from the current profile and expense snapshots.
//!
//! Nothing here holds state. Every value is recomputed from the slices it is
//! given, so a summary can never lag behind the snapshots it was built from.

use std::collections::HashMap;

use crate::{Amount, Category, expenses::Expense, profiles::Profile};

/// Sum of all expense amounts.
pub fn spent(expenses: &[Expense]) -> Amount {
    expenses.iter().map(|expense| expense.amount).sum()
}

/// Monthly budget of the profile, zero when there is none.
pub fn budget_of(profile: Option<&Profile>) -> Amount {
    profile
        .map(|profile| profile.monthly_salary)
        .unwrap_or_default()
}

/// `budget - spent`. Negative when the user overspent.
pub fn remaining(profile: Option<&Profile>, expenses: &[Expense]) -> Amount {
    budget_of(profile) - spent(expenses)
}

/// Per-category totals. Only categories that occur in `expenses` get an entry.
pub fn by_category(expenses: &[Expense]) -> HashMap<Category, Amount> {
    let mut totals: HashMap<Category, Amount> = HashMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_default() += expense.amount;
    }
    totals
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetSummary {
    pub budget: Amount,
    pub spent: Amount,
    pub remaining: Amount,
    pub by_category: HashMap<Category, Amount>,
}

impl BudgetSummary {
    pub fn compute(profile: Option<&Profile>, expenses: &[Expense]) -> Self {
        let budget = budget_of(profile);
        let spent = spent(expenses);
        Self {
            budget,
            spent,
            remaining: budget - spent,
            by_category: by_category(expenses),
        }
    }

    pub fn is_overspent(&self) -> bool {
        self.remaining.is_negative()
    }

    /// Share of the budget already spent, in percent. `None` without a budget.
    pub fn used_percent(&self) -> Option<f64> {
        if !self.budget.is_positive() {
            return None;
        }
        Some(self.spent.minor() as f64 * 100.0 / self.budget.minor() as f64)
    }

    /// Category totals, largest first; ties keep the fixed category order.
    pub fn categories_by_total(&self) -> Vec<(Category, Amount)> {
        let mut rows: Vec<(Category, Amount)> = self
            .by_category
            .iter()
            .map(|(category, amount)| (*category, *amount))
            .collect();
        rows.sort_by(|(ca, a), (cb, b)| b.cmp(a).then(ca.cmp(cb)));
        rows
    }
}
