//! Inventory item models.
//!
//! An inventory item is one serialized stock unit. Items are stored as JSON
//! documents next to the indexed `serial_number` column, whose `UNIQUE`
//! index is the only guard against duplicate serials.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::common::{de_opt_datetime, decode_documents, labeled_enum, DocumentRow};
use crate::error::{Error, Result};
use crate::validation::{tidy, tidy_upper, Violations, MAX_COUNT};

labeled_enum! {
    /// Operational state of a stocked unit
    pub enum InventoryStatus {
        Working => "Working",
        NotWorking => "Not Working",
        Discontinued => "Discontinued",
        Damaged => "Damaged",
        UnderRepair => "Under Repair",
    }
}

impl Default for InventoryStatus {
    fn default() -> Self {
        Self::Working
    }
}

labeled_enum! {
    pub enum InventoryCategory {
        Electronic => "Electronic",
        Mechanical => "Mechanical",
        Consumable => "Consumable",
        Accessory => "Accessory",
        Tool => "Tool",
        SparePart => "Spare Part",
        Other => "Other",
    }
}

impl Default for InventoryCategory {
    fn default() -> Self {
        Self::Other
    }
}

labeled_enum! {
    /// Physical condition, independent of whether the unit works
    pub enum ItemCondition {
        New => "New",
        Good => "Good",
        Fair => "Fair",
        Poor => "Poor",
        Damaged => "Damaged",
        Refurbished => "Refurbished",
    }
}

impl Default for ItemCondition {
    fn default() -> Self {
        Self::New
    }
}

labeled_enum! {
    pub enum RemarkType {
        General => "General",
        StockUpdate => "Stock Update",
        QualityIssue => "Quality Issue",
        Maintenance => "Maintenance",
        Allocation => "Allocation",
        Return => "Return",
    }
}

impl Default for RemarkType {
    fn default() -> Self {
        Self::General
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternatePartNumbers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate3: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warranty {
    /// Months
    pub warranty_period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    #[serde(rename = "_id")]
    pub id: String,
    pub comment: String,
    pub added_by: String,
    pub added_date: DateTime<Utc>,
    pub remark_type: RemarkType,
}

/// Who created and last touched the item, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    pub created_by: String,
    pub created_date: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_date: DateTime<Utc>,
}

impl AuditTrail {
    pub fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.last_modified_by = actor.to_string();
        self.last_modified_date = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub part_number: String,
    pub description: String,
    #[serde(default)]
    pub alternate_part_numbers: AlternatePartNumbers,
    pub serial_number: String,
    pub total_quantity: u32,
    pub location: Location,
    pub status: InventoryStatus,
    pub category: InventoryCategory,
    pub condition: ItemCondition,
    #[serde(default)]
    pub warranty: Warranty,
    #[serde(default)]
    pub remarks: Vec<Remark>,
    pub logging: AuditTrail,
    #[serde(default)]
    pub po_number: Vec<String>,
    #[serde(default)]
    pub dc_number: Vec<String>,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDraft {
    pub location_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyDraft {
    pub warranty_period: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub warranty_start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub warranty_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemarkDraft {
    pub comment: Option<String>,
    pub added_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub added_date: Option<DateTime<Utc>>,
    pub remark_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDraft {
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub last_modified_date: Option<DateTime<Utc>>,
}

/// Candidate inventory item as posted by a client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDraft {
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub alternate_part_numbers: Option<AlternatePartNumbers>,
    pub serial_number: Option<String>,
    pub total_quantity: Option<f64>,
    pub location: Option<LocationDraft>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub warranty: Option<WarrantyDraft>,
    #[serde(default)]
    pub remarks: Vec<RemarkDraft>,
    pub logging: Option<AuditDraft>,
    #[serde(default)]
    pub po_number: Vec<String>,
    #[serde(default)]
    pub dc_number: Vec<String>,
}

/// Stock, status and placement changes to an existing item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPatch {
    pub total_quantity: Option<f64>,
    pub status: Option<String>,
    pub condition: Option<String>,
    pub category: Option<String>,
    pub location: Option<LocationDraft>,
    pub po_number: Option<Vec<String>>,
    pub dc_number: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

fn check_total_quantity(v: &mut Violations, value: Option<f64>) {
    v.min_value("totalQuantity", value, 0.0, "Total quantity cannot be negative");
    v.whole_number("totalQuantity", value, "Total quantity must be a whole number");
    v.max_value("totalQuantity", value, MAX_COUNT, "Total quantity is too large");
}

fn check_location_text(v: &mut Violations, value: Option<&str>) {
    let path = "location.locationText";
    if v.required(path, value, "Location text is required") {
        v.min_len(path, value, 2, "Location text must be at least 2 characters");
        v.max_len(path, value, 100, "Location text cannot exceed 100 characters");
    }
}

fn check_status(v: &mut Violations, value: Option<&str>) {
    v.one_of::<InventoryStatus>("status", value, "Invalid inventory status");
}

fn check_category(v: &mut Violations, value: Option<&str>) {
    v.one_of::<InventoryCategory>("category", value, "Invalid category");
}

fn check_condition(v: &mut Violations, value: Option<&str>) {
    v.one_of::<ItemCondition>("condition", value, "Invalid condition");
}

fn check_reference_numbers(v: &mut Violations, field: &str, label: &str, values: &[String]) {
    let message = format!("{} number cannot exceed 50 characters", label);
    for (i, n) in values.iter().enumerate() {
        v.max_len(&format!("{}.{}", field, i), Some(n.as_str()), 50, &message);
    }
}

fn tidy_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|s| tidy(Some(s)))
        .collect()
}

fn parse_or_default<E: std::str::FromStr + Default>(value: Option<&str>) -> E {
    value.and_then(|s| s.parse().ok()).unwrap_or_default()
}

impl RemarkDraft {
    /// `addedBy` trimmed; the comment is kept verbatim
    pub fn normalize(&mut self) {
        self.added_by = tidy(self.added_by.take());
        self.remark_type = tidy(self.remark_type.take());
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("Remark");
        let comment = self.comment.as_deref().filter(|c| !c.is_empty());
        if v.required("comment", comment, "Remark comment is required") {
            v.max_len("comment", comment, 300, "Remark cannot exceed 300 characters");
        }
        v.required("addedBy", self.added_by.as_ref(), "Added by is required");
        v.one_of::<RemarkType>("remarkType", self.remark_type.as_deref(), "Invalid remark type");
        v
    }

    /// Normalize, default `addedBy` to the actor, validate, then build
    pub fn into_remark(mut self, actor: &str, now: DateTime<Utc>) -> std::result::Result<Remark, Violations> {
        self.normalize();
        if self.added_by.is_none() {
            self.added_by = tidy(Some(actor.to_string()));
        }
        self.validate().finish()?;
        Ok(self.build(now))
    }

    fn build(self, now: DateTime<Utc>) -> Remark {
        Remark {
            id: uuid::Uuid::new_v4().to_string(),
            comment: self.comment.unwrap_or_default(),
            added_by: self.added_by.unwrap_or_default(),
            added_date: self.added_date.unwrap_or(now),
            remark_type: parse_or_default(self.remark_type.as_deref()),
        }
    }
}

impl InventoryDraft {
    /// Apply the schema's trim/case rules
    pub fn normalize(&mut self) {
        self.part_number = tidy_upper(self.part_number.take());
        self.description = tidy(self.description.take());
        self.serial_number = tidy_upper(self.serial_number.take());
        self.status = tidy(self.status.take());
        self.category = tidy(self.category.take());
        self.condition = tidy(self.condition.take());

        if let Some(alt) = self.alternate_part_numbers.as_mut() {
            alt.alternate1 = tidy_upper(alt.alternate1.take());
            alt.alternate2 = tidy_upper(alt.alternate2.take());
            alt.alternate3 = tidy_upper(alt.alternate3.take());
        }
        if let Some(loc) = self.location.as_mut() {
            loc.location_text = tidy(loc.location_text.take());
        }
        if let Some(log) = self.logging.as_mut() {
            log.created_by = tidy(log.created_by.take());
            log.last_modified_by = tidy(log.last_modified_by.take());
        }
        for remark in &mut self.remarks {
            remark.normalize();
        }
        self.po_number = tidy_list(std::mem::take(&mut self.po_number));
        self.dc_number = tidy_list(std::mem::take(&mut self.dc_number));
    }

    /// Fill the audit and remark authorship from the authenticated user
    /// wherever the client left them out.
    pub fn attribute_to(&mut self, actor: &str) {
        let actor = tidy(Some(actor.to_string()));
        let log = self.logging.get_or_insert_with(AuditDraft::default);
        if log.created_by.is_none() {
            log.created_by = actor.clone();
        }
        if log.last_modified_by.is_none() {
            log.last_modified_by = actor.clone();
        }
        for remark in &mut self.remarks {
            if remark.added_by.is_none() {
                remark.added_by = actor.clone();
            }
        }
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("Inventory");

        let part_number = self.part_number.as_deref();
        if v.required("partNumber", part_number, "Part number is required") {
            v.min_len("partNumber", part_number, 3, "Part number must be at least 3 characters");
            v.max_len("partNumber", part_number, 50, "Part number cannot exceed 50 characters");
        }

        let description = self.description.as_deref();
        if v.required("description", description, "Part description is required") {
            v.min_len("description", description, 3, "Description must be at least 3 characters");
            v.max_len("description", description, 500, "Description cannot exceed 500 characters");
        }

        if let Some(alt) = &self.alternate_part_numbers {
            let slots = [&alt.alternate1, &alt.alternate2, &alt.alternate3];
            for (i, value) in slots.iter().enumerate() {
                let n = i + 1;
                v.max_len(
                    &format!("alternatePartNumbers.alternate{}", n),
                    value.as_deref(),
                    50,
                    &format!("Alternate part number {} cannot exceed 50 characters", n),
                );
            }
        }

        let serial = self.serial_number.as_deref();
        if v.required("serialNumber", serial, "Serial number is required") {
            v.min_len("serialNumber", serial, 3, "Serial number must be at least 3 characters");
            v.max_len("serialNumber", serial, 50, "Serial number cannot exceed 50 characters");
        }

        if v.required("totalQuantity", self.total_quantity.as_ref(), "Total quantity is required") {
            check_total_quantity(&mut v, self.total_quantity);
        }

        let location_text = self.location.as_ref().and_then(|l| l.location_text.as_deref());
        check_location_text(&mut v, location_text);

        check_status(&mut v, self.status.as_deref());
        check_category(&mut v, self.category.as_deref());
        check_condition(&mut v, self.condition.as_deref());

        if let Some(w) = &self.warranty {
            v.min_value("warranty.warrantyPeriod", w.warranty_period, 0.0, "Warranty period cannot be negative");
            v.whole_number(
                "warranty.warrantyPeriod",
                w.warranty_period,
                "Warranty period must be a whole number of months",
            );
            v.max_value("warranty.warrantyPeriod", w.warranty_period, MAX_COUNT, "Warranty period is too large");
            if let (Some(start), Some(end)) = (w.warranty_start_date, w.warranty_end_date) {
                v.check(
                    "warranty.warrantyEndDate",
                    end >= start,
                    "Warranty end date cannot be before start date",
                );
            }
        }

        for (i, remark) in self.remarks.iter().enumerate() {
            v.extend_prefixed(&format!("remarks.{}", i), remark.validate());
        }

        let log = self.logging.as_ref();
        v.required(
            "logging.createdBy",
            log.and_then(|l| l.created_by.as_ref()),
            "Created by is required",
        );
        v.required(
            "logging.lastModifiedBy",
            log.and_then(|l| l.last_modified_by.as_ref()),
            "Last modified by is required",
        );

        check_reference_numbers(&mut v, "poNumber", "PO", &self.po_number);
        check_reference_numbers(&mut v, "dcNumber", "DC", &self.dc_number);

        v
    }

    /// Normalize, attribute, validate and apply defaults. Nothing is
    /// persisted here.
    pub fn into_item(mut self, actor: &str, now: DateTime<Utc>) -> std::result::Result<InventoryItem, Violations> {
        self.normalize();
        self.attribute_to(actor);
        self.validate().finish()?;
        Ok(self.build(now))
    }

    fn build(self, now: DateTime<Utc>) -> InventoryItem {
        let warranty = self.warranty.map(build_warranty).unwrap_or_default();
        let log = self.logging.unwrap_or_default();

        InventoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            part_number: self.part_number.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            alternate_part_numbers: self.alternate_part_numbers.unwrap_or_default(),
            serial_number: self.serial_number.unwrap_or_default(),
            total_quantity: self.total_quantity.map(|q| q as u32).unwrap_or(0),
            location: Location {
                location_text: self
                    .location
                    .and_then(|l| l.location_text)
                    .unwrap_or_default(),
            },
            status: parse_or_default(self.status.as_deref()),
            category: parse_or_default(self.category.as_deref()),
            condition: parse_or_default(self.condition.as_deref()),
            warranty,
            remarks: self.remarks.into_iter().map(|r| r.build(now)).collect(),
            logging: AuditTrail {
                created_by: log.created_by.unwrap_or_default(),
                created_date: log.created_date.unwrap_or(now),
                last_modified_by: log.last_modified_by.unwrap_or_default(),
                last_modified_date: log.last_modified_date.unwrap_or(now),
            },
            po_number: self.po_number,
            dc_number: self.dc_number,
        }
    }
}

/// Derive the end date from start + period when only the start is known
fn build_warranty(draft: WarrantyDraft) -> Warranty {
    let period = draft.warranty_period.map(|p| p as u32).unwrap_or(0);
    let end = match (draft.warranty_start_date, draft.warranty_end_date) {
        (_, Some(end)) => Some(end),
        (Some(start), None) if period > 0 => start.checked_add_months(Months::new(period)),
        _ => None,
    };
    Warranty {
        warranty_period: period,
        warranty_start_date: draft.warranty_start_date,
        warranty_end_date: end,
    }
}

impl InventoryPatch {
    pub fn normalize(&mut self) {
        self.status = tidy(self.status.take());
        self.condition = tidy(self.condition.take());
        self.category = tidy(self.category.take());
        if let Some(loc) = self.location.as_mut() {
            loc.location_text = tidy(loc.location_text.take());
        }
        if let Some(po) = self.po_number.take() {
            self.po_number = Some(tidy_list(po));
        }
        if let Some(dc) = self.dc_number.take() {
            self.dc_number = Some(tidy_list(dc));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_quantity.is_none()
            && self.status.is_none()
            && self.condition.is_none()
            && self.category.is_none()
            && self.location.is_none()
            && self.po_number.is_none()
            && self.dc_number.is_none()
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("Inventory");
        check_total_quantity(&mut v, self.total_quantity);
        check_status(&mut v, self.status.as_deref());
        check_condition(&mut v, self.condition.as_deref());
        check_category(&mut v, self.category.as_deref());
        if let Some(loc) = &self.location {
            check_location_text(&mut v, loc.location_text.as_deref());
        }
        if let Some(po) = &self.po_number {
            check_reference_numbers(&mut v, "poNumber", "PO", po);
        }
        if let Some(dc) = &self.dc_number {
            check_reference_numbers(&mut v, "dcNumber", "DC", dc);
        }
        v
    }

    /// Normalize, validate and apply to `item`, refreshing its audit trail
    pub fn apply(
        mut self,
        item: &mut InventoryItem,
        actor: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), Violations> {
        self.normalize();
        self.validate().finish()?;

        if let Some(q) = self.total_quantity {
            item.total_quantity = q as u32;
        }
        if let Some(s) = self.status.as_deref().and_then(|s| s.parse().ok()) {
            item.status = s;
        }
        if let Some(c) = self.condition.as_deref().and_then(|s| s.parse().ok()) {
            item.condition = c;
        }
        if let Some(c) = self.category.as_deref().and_then(|s| s.parse().ok()) {
            item.category = c;
        }
        if let Some(text) = self.location.and_then(|l| l.location_text) {
            item.location.location_text = text;
        }
        if let Some(po) = self.po_number {
            item.po_number = po;
        }
        if let Some(dc) = self.dc_number {
            item.dc_number = dc;
        }
        item.logging.touch(actor, now);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

impl InventoryItem {
    /// Persist a new item. A clashing serial number surfaces as
    /// [`Error::DuplicateKey`] and leaves the existing row untouched.
    pub async fn insert(db: &SqlitePool, item: &InventoryItem) -> Result<()> {
        let document = serde_json::to_string(item)?;

        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, serial_number, part_number, document, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.serial_number)
        .bind(&item.part_number)
        .bind(&document)
        .bind(item.logging.created_date.to_rfc3339())
        .execute(db)
        .await?;

        Ok(())
    }

    /// Replace the stored document for an existing item
    pub async fn update(db: &SqlitePool, item: &InventoryItem) -> Result<()> {
        let document = serde_json::to_string(item)?;

        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET serial_number = ?, part_number = ?, document = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.serial_number)
        .bind(&item.part_number)
        .bind(&document)
        .bind(&item.id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Inventory item not found".to_string()));
        }
        Ok(())
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<InventoryItem>> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, document FROM inventory_items WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.document)?)),
            None => Ok(None),
        }
    }

    /// Every item in insertion order
    pub async fn list(db: &SqlitePool) -> Result<Vec<InventoryItem>> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT id, document FROM inventory_items ORDER BY rowid")
                .fetch_all(db)
                .await?;
        Ok(decode_documents(rows)?)
    }

    /// Items whose purchase-order list contains `po_number` (uppercased)
    pub async fn find_by_po_number(db: &SqlitePool, po_number: &str) -> Result<Vec<InventoryItem>> {
        Self::find_by_list_member(db, "$.poNumber", po_number).await
    }

    /// Items whose delivery-challan list contains `dc_number` (uppercased)
    pub async fn find_by_dc_number(db: &SqlitePool, dc_number: &str) -> Result<Vec<InventoryItem>> {
        Self::find_by_list_member(db, "$.dcNumber", dc_number).await
    }

    async fn find_by_list_member(
        db: &SqlitePool,
        json_path: &str,
        value: &str,
    ) -> Result<Vec<InventoryItem>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.document
            FROM inventory_items i
            WHERE EXISTS (
                SELECT 1 FROM json_each(i.document, ?) AS member
                WHERE member.value = ?
            )
            ORDER BY i.rowid
            "#,
        )
        .bind(json_path)
        .bind(value.trim().to_uppercase())
        .fetch_all(db)
        .await?;
        Ok(decode_documents(rows)?)
    }
}
