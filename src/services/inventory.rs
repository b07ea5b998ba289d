use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{InventoryDraft, InventoryItem, InventoryPatch, RemarkDraft, User};
use crate::error::{Error, Result};

fn not_found() -> Error {
    Error::NotFound("Inventory item not found".to_string())
}

/// Validate and store a new item. Nothing is written when validation fails
/// or the serial number is already taken.
pub async fn create(db: &SqlitePool, actor: &User, draft: InventoryDraft) -> Result<InventoryItem> {
    let item = draft.into_item(&actor.full_name(), Utc::now())?;

    InventoryItem::insert(db, &item).await.map_err(|e| match e {
        Error::DuplicateKey(_) => Error::DuplicateKey(format!(
            "Duplicate key: serialNumber \"{}\" already exists",
            item.serial_number
        )),
        other => other,
    })?;

    info!(
        id = %item.id,
        serial_number = %item.serial_number,
        user = %actor.id,
        "Inventory item created"
    );
    Ok(item)
}

pub async fn list(db: &SqlitePool) -> Result<Vec<InventoryItem>> {
    InventoryItem::list(db).await
}

pub async fn get(db: &SqlitePool, id: &str) -> Result<InventoryItem> {
    InventoryItem::get_by_id(db, id).await?.ok_or_else(not_found)
}

/// Change stock, status, condition, category, location or reference
/// numbers of an existing item.
pub async fn update(
    db: &SqlitePool,
    actor: &User,
    id: &str,
    patch: InventoryPatch,
) -> Result<InventoryItem> {
    let mut item = get(db, id).await?;
    patch.apply(&mut item, &actor.full_name(), Utc::now())?;
    InventoryItem::update(db, &item).await?;

    info!(id = %item.id, user = %actor.id, "Inventory item updated");
    Ok(item)
}

pub async fn add_remark(
    db: &SqlitePool,
    actor: &User,
    id: &str,
    draft: RemarkDraft,
) -> Result<InventoryItem> {
    let mut item = get(db, id).await?;
    let now = Utc::now();
    let actor_name = actor.full_name();

    let remark = draft.into_remark(&actor_name, now)?;
    item.remarks.push(remark);
    item.logging.touch(&actor_name, now);
    InventoryItem::update(db, &item).await?;

    info!(id = %item.id, user = %actor.id, remarks = item.remarks.len(), "Remark added");
    Ok(item)
}

pub async fn find_by_po_number(db: &SqlitePool, po_number: &str) -> Result<Vec<InventoryItem>> {
    InventoryItem::find_by_po_number(db, po_number).await
}

pub async fn find_by_dc_number(db: &SqlitePool, dc_number: &str) -> Result<Vec<InventoryItem>> {
    InventoryItem::find_by_dc_number(db, dc_number).await
}
