//! Identity map.
//!
//! Every table is keyed by an internal `i64` user key. Callers authenticate users with an
//! external provider and translate its id here; the mapping is created on first sight and
//! stable afterwards.

use crate::{
    entities::{UserIdentity, user_identity},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tracing::{debug, instrument};

/// Looks up the internal key of an external id without creating one.
pub async fn find_user_id<C>(db: &C, external_id: &str) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let identity = UserIdentity::find()
        .filter(user_identity::Column::ExternalId.eq(external_id))
        .one(db)
        .await?;
    Ok(identity.map(|identity| identity.id))
}

/// Returns the internal key of an external id, creating the mapping if needed.
///
/// Concurrent first calls for the same id converge on one row through the unique
/// constraint on `external_id`.
///
/// # Errors
/// Returns an error if the external id is empty or the database fails.
#[instrument(skip(db))]
pub async fn resolve_user_id<C>(db: &C, external_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(Error::InvalidUserId {
            external_id: external_id.to_string(),
        });
    }

    if let Some(user_id) = find_user_id(db, external_id).await? {
        return Ok(user_id);
    }

    let identity = user_identity::ActiveModel {
        external_id: Set(external_id.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let inserted = UserIdentity::insert(identity)
        .on_conflict(
            OnConflict::column(user_identity::Column::ExternalId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    if inserted > 0 {
        debug!("Created identity mapping");
    }

    find_user_id(db, external_id).await?.ok_or_else(|| {
        Error::Database(DbErr::RecordNotFound(format!(
            "identity for external id {external_id}"
        )))
    })
}
