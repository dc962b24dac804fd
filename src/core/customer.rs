//! Customer records keyed by the identity provider's user id.

use crate::{entities::customer, errors::Result};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, EntityTrait, Set, sea_query::OnConflict};

/// Inserts the customer if missing; refreshes the display name when one is given.
pub async fn ensure_customer<C>(
    conn: &C,
    customer_id: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let model = customer::ActiveModel {
        id: Set(customer_id.to_string()),
        display_name: Set(display_name.map(ToString::to_string)),
        created_at: Set(now),
    };

    let on_conflict = if display_name.is_some() {
        OnConflict::column(customer::Column::Id)
            .update_column(customer::Column::DisplayName)
            .to_owned()
    } else {
        OnConflict::column(customer::Column::Id)
            .do_nothing()
            .to_owned()
    };

    customer::Entity::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Looks up a customer by id.
pub async fn get_customer<C>(conn: &C, customer_id: &str) -> Result<Option<customer::Model>>
where
    C: ConnectionTrait,
{
    customer::Entity::find_by_id(customer_id.to_string())
        .one(conn)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_ensure_customer_is_idempotent_and_keeps_name() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();

        ensure_customer(&db, "U_TEST_001", Some("Ploy"), now).await?;
        ensure_customer(&db, "U_TEST_001", None, now).await?;

        let stored = get_customer(&db, "U_TEST_001").await?.unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Ploy"));

        ensure_customer(&db, "U_TEST_001", Some("Ploy B."), now).await?;
        let renamed = get_customer(&db, "U_TEST_001").await?.unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Ploy B."));
        Ok(())
    }
}
