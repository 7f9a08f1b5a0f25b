use log::debug;

use crate::error::{InsightsError, Result};
use crate::schema::{ColumnOverrides, Record, SchemaGuess};

pub const MISSING_REQUIRED_COLUMNS: &str =
    "Missing required columns. Please map a date column and an amount/revenue column.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Date,
    Revenue,
    Cost,
    Profit,
    Product,
    Qty,
}

/// Roles in evaluation order, each with aliases in priority order.
pub const ROLE_ALIASES: &[(Role, &[&str])] = &[
    (Role::Date, &["date", "day"]),
    (Role::Revenue, &["revenue", "sales", "gmv"]),
    (Role::Cost, &["cost", "cogs", "spend"]),
    (Role::Profit, &["profit", "margin"]),
    (Role::Product, &["product", "sku", "item", "name"]),
    (Role::Qty, &["qty", "quantity", "units"]),
];

/// Finds the first header containing the earliest alias, case-insensitively.
pub fn match_alias<'a>(headers: &[&'a str], aliases: &[&str]) -> Option<&'a str> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    aliases.iter().find_map(|alias| {
        lowered
            .iter()
            .position(|header| header.contains(alias))
            .map(|idx| headers[idx])
    })
}

/// Guesses column roles from the headers of a representative record.
pub fn guess_schema(record: &Record) -> SchemaGuess {
    let headers: Vec<&str> = record.columns().collect();
    let mut guess = SchemaGuess::default();

    for (role, aliases) in ROLE_ALIASES {
        let found = match_alias(&headers, aliases).map(str::to_string);
        let slot = match role {
            Role::Date => &mut guess.date,
            Role::Revenue => &mut guess.revenue,
            Role::Cost => &mut guess.cost,
            Role::Profit => &mut guess.profit,
            Role::Product => &mut guess.product,
            Role::Qty => &mut guess.qty,
        };
        *slot = found;
    }

    debug!("Inferred schema from {} headers: {:?}", headers.len(), guess);
    guess
}

/// Replaces date, revenue and category roles with any non-empty override.
///
/// Overrides are not checked against the headers here; [`require_roles`]
/// does that for the roles the pipeline cannot run without.
pub fn apply_overrides(schema: &SchemaGuess, overrides: &ColumnOverrides) -> SchemaGuess {
    fn pick(over: &Option<String>, inferred: &Option<String>) -> Option<String> {
        match over.as_deref() {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => inferred.clone(),
        }
    }

    SchemaGuess {
        date: pick(&overrides.date_column, &schema.date),
        revenue: pick(&overrides.revenue_column, &schema.revenue),
        cost: schema.cost.clone(),
        profit: schema.profit.clone(),
        product: pick(&overrides.category_column, &schema.product),
        qty: schema.qty.clone(),
    }
}

/// Ensures date and revenue roles point at real columns.
pub fn require_roles(schema: &SchemaGuess, columns: &[String]) -> Result<()> {
    let resolved = |role: &Option<String>| {
        role.as_ref()
            .is_some_and(|name| columns.iter().any(|c| c == name))
    };

    if resolved(&schema.date) && resolved(&schema.revenue) {
        Ok(())
    } else {
        Err(InsightsError::SchemaUnresolved {
            message: MISSING_REQUIRED_COLUMNS.to_string(),
            columns: columns.to_vec(),
        })
    }
}
