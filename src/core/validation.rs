use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::{CurrencyCode, FinancialPlan, PlanParameters},
    errors::ValidationError,
};

/// Longest plan accepted: one hundred years.
pub const MAX_DURATION_MONTHS: i64 = 1200;

/// Checks plan parameters in a fixed order and returns the first rule that fails.
pub fn validate_parameters(params: &PlanParameters) -> Result<(), ValidationError> {
    if params.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !params.monthly_income.is_finite() || params.monthly_income < 0.0 {
        return Err(ValidationError::InvalidIncome(params.monthly_income));
    }
    if !(1..=MAX_DURATION_MONTHS).contains(&params.duration_in_months) {
        return Err(ValidationError::InvalidDuration(params.duration_in_months));
    }
    if !params.use_app_expense_data
        && (!params.manual_monthly_expenses.is_finite() || params.manual_monthly_expenses < 0.0)
    {
        return Err(ValidationError::InvalidManualExpenses(
            params.manual_monthly_expenses,
        ));
    }
    if params.is_inflation_applied {
        match params.inflation_rate {
            None => return Err(ValidationError::MissingInflationRate),
            Some(rate) if !rate.is_finite() || rate < 0.0 => {
                return Err(ValidationError::InvalidInflationRate(rate))
            }
            Some(_) => {}
        }
    }
    if params.is_interest_applied {
        match params.interest_rate {
            None => return Err(ValidationError::MissingInterestRate),
            Some(rate) if !rate.is_finite() || rate < 0.0 => {
                return Err(ValidationError::InvalidInterestRate(rate))
            }
            Some(_) => {}
        }
    }
    if params
        .default_currency
        .as_ref()
        .is_some_and(CurrencyCode::is_empty)
    {
        return Err(ValidationError::EmptyCurrency);
    }
    Ok(())
}

/// Validates `params` and builds the immutable plan they describe.
pub fn build_plan(
    params: &PlanParameters,
    fallback_currency: &CurrencyCode,
    now: DateTime<Utc>,
) -> Result<FinancialPlan, ValidationError> {
    validate_parameters(params)?;
    Ok(FinancialPlan {
        id: Uuid::new_v4(),
        name: params.name.trim().to_string(),
        start_date: params.start_date,
        duration_in_months: params.duration_in_months as u32,
        monthly_income: params.monthly_income,
        manual_monthly_expenses: params.manual_monthly_expenses.max(0.0),
        use_app_expense_data: params.use_app_expense_data,
        is_inflation_applied: params.is_inflation_applied,
        inflation_rate: params.inflation_rate.unwrap_or(0.0),
        is_interest_applied: params.is_interest_applied,
        interest_rate: params.interest_rate.unwrap_or(0.0),
        interest_type: params.interest_type,
        created_at: now,
        updated_at: now,
        default_currency: params
            .default_currency
            .clone()
            .unwrap_or_else(|| fallback_currency.clone()),
    })
}
