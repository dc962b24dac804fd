//! Catalog business logic - treatments, toppings and branches.
//!
//! The catalog is seeded from config.toml at startup and is otherwise read-only.
//! Lookups here resolve the business keys used on the wire (treatment codes,
//! topping codes, branch ids) into stored rows.

use crate::{
    config::settings::Config,
    entities::{Branch, Topping, Treatment, branch, topping, treatment},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Topping category that may appear at most once per appointment.
pub const MASK_CATEGORY: &str = "mask";

const TOPPING_CATEGORIES: [&str; 3] = ["scrub", MASK_CATEGORY, "misting"];

/// Add-on as recorded on an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedAddon {
    pub code: String,
    pub name: String,
    pub price_thb: f64,
}

/// Add-ons resolved from topping codes, with their price total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAddons {
    pub items: Vec<SelectedAddon>,
    pub total_thb: f64,
}

/// Counts of catalog rows inserted by [`seed_catalog`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub treatments: usize,
    pub toppings: usize,
    pub branches: usize,
}

/// Finds a treatment by its code.
pub async fn find_treatment_by_code<C>(conn: &C, code: &str) -> Result<Option<treatment::Model>>
where
    C: ConnectionTrait,
{
    Treatment::find()
        .filter(treatment::Column::Code.eq(code))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Finds a treatment by its code, failing with `TreatmentNotFound` if absent.
pub async fn require_treatment<C>(conn: &C, code: &str) -> Result<treatment::Model>
where
    C: ConnectionTrait,
{
    find_treatment_by_code(conn, code)
        .await?
        .ok_or_else(|| Error::TreatmentNotFound {
            code: code.to_string(),
        })
}

/// Loads a treatment by id.
pub async fn get_treatment<C>(conn: &C, treatment_id: i64) -> Result<treatment::Model>
where
    C: ConnectionTrait,
{
    Treatment::find_by_id(treatment_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::TreatmentNotFound {
            code: treatment_id.to_string(),
        })
}

/// Loads a branch that is accepting bookings.
///
/// # Errors
/// `BranchNotFound` for an unknown id, `BranchUnavailable` for an inactive branch.
pub async fn require_active_branch<C>(conn: &C, branch_id: &str) -> Result<branch::Model>
where
    C: ConnectionTrait,
{
    let branch = Branch::find_by_id(branch_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| Error::BranchNotFound {
            id: branch_id.to_string(),
        })?;

    if !branch.is_active {
        return Err(Error::BranchUnavailable {
            id: branch_id.to_string(),
        });
    }
    Ok(branch)
}

/// Lists toppings ordered by category then code, optionally only active ones.
pub async fn list_toppings(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<topping::Model>> {
    let mut query = Topping::find();
    if active_only {
        query = query.filter(topping::Column::IsActive.eq(true));
    }
    query
        .order_by_asc(topping::Column::Category)
        .order_by_asc(topping::Column::Code)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Resolves topping codes into the add-on list stored on an appointment.
///
/// The input order is preserved.
///
/// # Errors
/// - `ToppingNotFound` for an unknown code
/// - `InvalidInput` for an inactive topping, a repeated code, or more than one mask
pub async fn resolve_addons<C>(conn: &C, codes: &[String]) -> Result<ResolvedAddons>
where
    C: ConnectionTrait,
{
    if codes.is_empty() {
        return Ok(ResolvedAddons::default());
    }

    let rows = Topping::find()
        .filter(topping::Column::Code.is_in(codes.iter().map(String::as_str)))
        .all(conn)
        .await?;

    let mut resolved = ResolvedAddons::default();
    let mut masks = 0;
    for (index, code) in codes.iter().enumerate() {
        if codes[..index].contains(code) {
            return Err(Error::InvalidInput {
                message: format!("Topping '{code}' selected more than once"),
            });
        }
        let row = rows
            .iter()
            .find(|row| &row.code == code)
            .ok_or_else(|| Error::ToppingNotFound { code: code.clone() })?;
        if !row.is_active {
            return Err(Error::InvalidInput {
                message: format!("Topping '{code}' is not available"),
            });
        }
        if row.category == MASK_CATEGORY {
            masks += 1;
            if masks > 1 {
                return Err(Error::InvalidInput {
                    message: "At most one mask topping may be selected".to_string(),
                });
            }
        }
        resolved.total_thb += row.price_thb;
        resolved.items.push(SelectedAddon {
            code: row.code.clone(),
            name: row.display_title().to_string(),
            price_thb: row.price_thb,
        });
    }
    Ok(resolved)
}

/// Inserts catalog entries from config that are not yet stored.
///
/// Existing rows are left untouched so staff edits survive restarts.
pub async fn seed_catalog(db: &DatabaseConnection, config: &Config) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for seed in &config.treatments {
        if find_treatment_by_code(db, &seed.code).await?.is_some() {
            continue;
        }
        treatment::ActiveModel {
            code: Set(seed.code.clone()),
            title_th: Set(seed.title_th.clone()),
            title_en: Set(seed.title_en.clone()),
            duration_min: Set(seed.duration_min),
            ..Default::default()
        }
        .insert(db)
        .await?;
        summary.treatments += 1;
    }

    for seed in &config.toppings {
        if !TOPPING_CATEGORIES.contains(&seed.category.as_str()) {
            return Err(Error::Config {
                message: format!(
                    "Topping '{}' has unknown category '{}'",
                    seed.code, seed.category
                ),
            });
        }
        let exists = Topping::find()
            .filter(topping::Column::Code.eq(seed.code.as_str()))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }
        topping::ActiveModel {
            code: Set(seed.code.clone()),
            category: Set(seed.category.clone()),
            title_th: Set(seed.title_th.clone()),
            title_en: Set(seed.title_en.clone()),
            price_thb: Set(seed.price_thb),
            is_active: Set(seed.is_active),
            ..Default::default()
        }
        .insert(db)
        .await?;
        summary.toppings += 1;
    }

    for seed in &config.branches {
        if Branch::find_by_id(seed.id.clone()).one(db).await?.is_some() {
            continue;
        }
        branch::ActiveModel {
            id: Set(seed.id.clone()),
            label: Set(seed.label.clone()),
            is_active: Set(seed.is_active),
        }
        .insert(db)
        .await?;
        summary.branches += 1;
    }

    info!(
        "Catalog seeded: {} treatments, {} toppings, {} branches added",
        summary.treatments, summary.toppings, summary.branches
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();

        let first = seed_catalog(&db, &config).await?;
        assert_eq!(first.treatments, 1);
        assert_eq!(first.branches, 3);

        let second = seed_catalog(&db, &config).await?;
        assert_eq!(second, SeedSummary::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_require_active_branch() -> Result<()> {
        let db = setup_seeded_db().await?;

        assert!(require_active_branch(&db, TEST_BRANCH).await.is_ok());
        assert!(matches!(
            require_active_branch(&db, "branch-mk").await,
            Err(Error::BranchUnavailable { .. })
        ));
        assert!(matches!(
            require_active_branch(&db, "branch-nowhere").await,
            Err(Error::BranchNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_addons_keeps_order_and_totals() -> Result<()> {
        let db = setup_seeded_db().await?;

        let codes = vec!["mask-gold".to_string(), "scrub-coffee".to_string()];
        let resolved = resolve_addons(&db, &codes).await?;

        assert_eq!(resolved.items.len(), 2);
        assert_eq!(resolved.items[0].code, "mask-gold");
        assert_eq!(resolved.items[1].code, "scrub-coffee");
        assert_eq!(resolved.total_thb, 450.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_addons_rejects_bad_selections() -> Result<()> {
        let db = setup_seeded_db().await?;

        let two_masks = vec!["mask-gold".to_string(), "mask-normal".to_string()];
        assert!(matches!(
            resolve_addons(&db, &two_masks).await,
            Err(Error::InvalidInput { .. })
        ));

        let unknown = vec!["mask-platinum".to_string()];
        assert!(matches!(
            resolve_addons(&db, &unknown).await,
            Err(Error::ToppingNotFound { .. })
        ));

        let inactive = vec!["misting-rose".to_string()];
        assert!(matches!(
            resolve_addons(&db, &inactive).await,
            Err(Error::InvalidInput { .. })
        ));

        let repeated = vec!["scrub-coffee".to_string(), "scrub-coffee".to_string()];
        assert!(matches!(
            resolve_addons(&db, &repeated).await,
            Err(Error::InvalidInput { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_toppings_active_filter() -> Result<()> {
        let db = setup_seeded_db().await?;

        let all = list_toppings(&db, false).await?;
        let active = list_toppings(&db, true).await?;

        assert_eq!(all.len(), 4);
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|t| t.is_active));
        Ok(())
    }
}
