//! Part request models: a field engineer's request for parts against an
//! instrument at a customer site, and the approval/dispatch/return
//! lifecycle it moves through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::common::{de_opt_datetime, decode_documents, labeled_enum, DocumentRow};
use crate::error::{Error, Result};
use crate::validation::{is_contact_phone, is_email, tidy, tidy_upper, Violations, MAX_COUNT};

labeled_enum! {
    pub enum RequestCategory {
        Warranty => "Warranty",
        Amc => "AMC",
        Cmc => "CMC",
        ZefEdge => "ZefEdge",
        OfficeConsumption => "Office Consumption",
        TestAndMeasurement => "T&M",
        PartRepair => "Part Repair",
    }
}

labeled_enum! {
    pub enum RequestPurpose {
        Troubleshooting => "Troubleshooting",
        Loan => "Loan",
        Sale => "Sale",
        WarrantyReplacement => "Warranty Replacement",
        Refurbint => "Refurbint",
        Refurbext => "Refurbext",
    }
}

labeled_enum! {
    /// Whether the parts are expected back
    pub enum RequestBasis {
        Returnable => "Returnable",
        NonReturnable => "Non-returnable",
    }
}

labeled_enum! {
    pub enum RequestStatus {
        Pending => "Pending",
        Approved => "Approved",
        PartiallyApproved => "Partially Approved",
        Rejected => "Rejected",
        Dispatched => "Dispatched",
        Delivered => "Delivered",
        Returned => "Returned",
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RequestStatus {
    /// Delivered and returned requests can no longer be overdue
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Delivered | Self::Returned)
    }

    /// Legal moves of the request lifecycle. Parts only come back on a
    /// returnable basis.
    pub fn can_transition_to(self, next: RequestStatus, basis: Option<RequestBasis>) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Pending, Approved | PartiallyApproved | Rejected) => true,
            (Approved | PartiallyApproved, Dispatched) => true,
            (Dispatched, Delivered) => true,
            (Delivered, Returned) => basis == Some(RequestBasis::Returnable),
            _ => false,
        }
    }
}

labeled_enum! {
    pub enum Priority {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

labeled_enum! {
    pub enum ReturnCondition {
        Good => "Good",
        Damaged => "Damaged",
        PartiallyWorking => "Partially Working",
        NotWorking => "Not Working",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartLineItem {
    #[serde(rename = "_id")]
    pub id: String,
    /// Position of the line on the paper form, not a part serial
    pub serial_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A name and the date it was signed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signoff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedBy {
    pub service_engineer: Signoff,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedBy {
    pub national_manager: Signoff,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_return_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_condition: Option<ReturnCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_date_of_return: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_contact_details: ContactDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RequestCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<RequestPurpose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<RequestBasis>,
    pub parts_requested: Vec<PartLineItem>,
    pub status: RequestStatus,
    #[serde(default)]
    pub prepared_by: PreparedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ApprovedBy>,
    pub total_items: u32,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_details: Option<DispatchDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_details: Option<ReturnDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartRequest {
    /// Sum of line-item quantities. Never stored.
    pub fn total_quantity(&self) -> u64 {
        self.parts_requested.iter().map(|p| p.quantity as u64).sum()
    }

    /// Open requests are overdue once `now` passes the estimated return
    /// date. Requests without one are never overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_closed() {
            return false;
        }
        match self.estimated_date_of_return {
            Some(due) => now > due,
            None => false,
        }
    }

    fn sync_derived(&mut self) {
        self.total_items = self.parts_requested.len() as u32;
    }
}

/// Read model returned to clients: the stored record plus the values
/// derived from it at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRequestView {
    #[serde(flatten)]
    pub request: PartRequest,
    pub total_quantity: u64,
    pub is_overdue: bool,
}

impl PartRequestView {
    pub fn at(request: PartRequest, now: DateTime<Utc>) -> Self {
        Self {
            total_quantity: request.total_quantity(),
            is_overdue: request.is_overdue(now),
            request,
        }
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    pub serial_number: Option<f64>,
    pub material_description: Option<String>,
    pub part_number: Option<String>,
    pub quantity: Option<f64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignoffDraft {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedByDraft {
    pub service_engineer: Option<SignoffDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedByDraft {
    pub national_manager: Option<SignoffDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchDraft {
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub dispatch_date: Option<DateTime<Utc>>,
    pub courier_service: Option<String>,
    pub tracking_number: Option<String>,
    pub dispatched_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDraft {
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub actual_return_date: Option<DateTime<Utc>>,
    pub return_condition: Option<String>,
    pub return_notes: Option<String>,
}

/// Candidate part request as posted by a client. A client-supplied
/// `totalItems` is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRequestDraft {
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub date: Option<DateTime<Utc>>,
    pub engineer_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub estimated_date_of_return: Option<DateTime<Utc>>,
    pub customer_name: Option<String>,
    pub customer_contact_details: Option<ContactDetails>,
    pub instrument_model: Option<String>,
    pub instrument_serial_number: Option<String>,
    pub category: Option<String>,
    pub purpose: Option<String>,
    pub basis: Option<String>,
    #[serde(default)]
    pub parts_requested: Vec<LineItemDraft>,
    pub status: Option<String>,
    pub prepared_by: Option<PreparedByDraft>,
    pub approved_by: Option<ApprovedByDraft>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    pub dispatch_details: Option<DispatchDraft>,
    pub return_details: Option<ReturnDraft>,
}

fn return_condition_message(value: &str) -> String {
    format!(
        "`{}` is not a valid enum value for path `returnDetails.returnCondition`.",
        value
    )
}

impl LineItemDraft {
    pub fn normalize(&mut self) {
        self.material_description = tidy(self.material_description.take());
        self.part_number = tidy_upper(self.part_number.take());
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("PartItem");

        if v.required("serialNumber", self.serial_number.as_ref(), "Serial number is required") {
            v.min_value("serialNumber", self.serial_number, 1.0, "Serial number must be positive");
            v.whole_number("serialNumber", self.serial_number, "Serial number must be a whole number");
            v.max_value("serialNumber", self.serial_number, MAX_COUNT, "Serial number is too large");
        }

        let desc = self.material_description.as_deref();
        v.min_len("materialDescription", desc, 3, "Material description must be at least 3 characters");
        v.max_len("materialDescription", desc, 500, "Material description cannot exceed 500 characters");

        let part = self.part_number.as_deref();
        v.min_len("partNumber", part, 3, "Part number must be at least 3 characters");
        v.max_len("partNumber", part, 50, "Part number cannot exceed 50 characters");

        if v.required("quantity", self.quantity.as_ref(), "Quantity is required") {
            v.min_value("quantity", self.quantity, 1.0, "Quantity must be at least 1");
            v.whole_number("quantity", self.quantity, "Quantity must be a whole number");
            v.max_value("quantity", self.quantity, MAX_COUNT, "Quantity is too large");
        }

        v.max_len("remarks", self.remarks.as_deref(), 300, "Remarks cannot exceed 300 characters");
        v
    }

    fn build(self) -> PartLineItem {
        PartLineItem {
            id: uuid::Uuid::new_v4().to_string(),
            serial_number: self.serial_number.map(|n| n as u32).unwrap_or(0),
            material_description: self.material_description,
            part_number: self.part_number,
            quantity: self.quantity.map(|q| q as u32).unwrap_or(0),
            remarks: self.remarks.unwrap_or_default(),
        }
    }
}

impl DispatchDraft {
    fn normalize(&mut self) {
        self.courier_service = tidy(self.courier_service.take());
        self.tracking_number = tidy(self.tracking_number.take());
        self.dispatched_by = tidy(self.dispatched_by.take());
    }

    fn build(self) -> DispatchDetails {
        DispatchDetails {
            dispatch_date: self.dispatch_date,
            courier_service: self.courier_service,
            tracking_number: self.tracking_number,
            dispatched_by: self.dispatched_by,
            estimated_delivery: self.estimated_delivery,
        }
    }
}

impl ReturnDraft {
    fn normalize(&mut self) {
        self.return_condition = tidy(self.return_condition.take());
        self.return_notes = tidy(self.return_notes.take());
    }

    fn validate_into(&self, v: &mut Violations) {
        if let Some(cond) = self.return_condition.as_deref() {
            v.one_of::<ReturnCondition>(
                "returnDetails.returnCondition",
                Some(cond),
                &return_condition_message(cond),
            );
        }
    }

    fn build(self) -> ReturnDetails {
        ReturnDetails {
            actual_return_date: self.actual_return_date,
            return_condition: self.return_condition.as_deref().and_then(|c| c.parse().ok()),
            return_notes: self.return_notes,
        }
    }
}

impl PartRequestDraft {
    pub fn normalize(&mut self) {
        self.engineer_name = tidy(self.engineer_name.take());
        self.customer_name = tidy(self.customer_name.take());
        self.instrument_model = tidy(self.instrument_model.take());
        self.instrument_serial_number = tidy_upper(self.instrument_serial_number.take());
        self.category = tidy(self.category.take());
        self.purpose = tidy(self.purpose.take());
        self.basis = tidy(self.basis.take());
        self.status = tidy(self.status.take());
        self.priority = tidy(self.priority.take());
        self.notes = tidy(self.notes.take());

        if let Some(contact) = self.customer_contact_details.as_mut() {
            contact.phone = tidy(contact.phone.take());
            contact.email = tidy(contact.email.take());
            contact.address = tidy(contact.address.take());
        }
        if let Some(engineer) = self
            .prepared_by
            .as_mut()
            .and_then(|p| p.service_engineer.as_mut())
        {
            engineer.name = tidy(engineer.name.take());
        }
        if let Some(manager) = self
            .approved_by
            .as_mut()
            .and_then(|a| a.national_manager.as_mut())
        {
            manager.name = tidy(manager.name.take());
        }
        if let Some(dispatch) = self.dispatch_details.as_mut() {
            dispatch.normalize();
        }
        if let Some(ret) = self.return_details.as_mut() {
            ret.normalize();
        }
        for item in &mut self.parts_requested {
            item.normalize();
        }
    }

    /// Default the preparing engineer to the authenticated user
    pub fn attribute_to(&mut self, actor: &str) {
        let engineer = self
            .prepared_by
            .get_or_insert_with(PreparedByDraft::default)
            .service_engineer
            .get_or_insert_with(SignoffDraft::default);
        if engineer.name.is_none() {
            engineer.name = tidy(Some(actor.to_string()));
        }
    }

    /// Check every field rule. `now` is the instant the estimated return
    /// date has to lie beyond.
    pub fn validate(&self, now: DateTime<Utc>) -> Violations {
        let mut v = Violations::new("PartRequest");

        let engineer = self.engineer_name.as_deref();
        v.min_len("engineerName", engineer, 2, "Engineer name must be at least 2 characters");
        v.max_len("engineerName", engineer, 100, "Engineer name cannot exceed 100 characters");

        if let Some(due) = self.estimated_date_of_return {
            v.check(
                "estimatedDateOfReturn",
                due > now,
                "Estimated return date must be in the future",
            );
        }

        let customer = self.customer_name.as_deref();
        v.min_len("customerName", customer, 2, "Customer name must be at least 2 characters");
        v.max_len("customerName", customer, 150, "Customer name cannot exceed 150 characters");

        if let Some(contact) = &self.customer_contact_details {
            if let Some(phone) = contact.phone.as_deref() {
                v.check(
                    "customerContactDetails.phone",
                    is_contact_phone(phone),
                    "Please enter a valid phone number",
                );
            }
            if let Some(email) = contact.email.as_deref() {
                v.check(
                    "customerContactDetails.email",
                    is_email(email),
                    "Please enter a valid email address",
                );
            }
            v.max_len(
                "customerContactDetails.address",
                contact.address.as_deref(),
                300,
                "Address cannot exceed 300 characters",
            );
        }

        let model = self.instrument_model.as_deref();
        v.min_len("instrumentModel", model, 2, "Instrument model must be at least 2 characters");
        v.max_len("instrumentModel", model, 100, "Instrument model cannot exceed 100 characters");

        let serial = self.instrument_serial_number.as_deref();
        v.min_len("instrumentSerialNumber", serial, 3, "Serial number must be at least 3 characters");
        v.max_len("instrumentSerialNumber", serial, 50, "Serial number cannot exceed 50 characters");

        v.one_of::<RequestCategory>(
            "category",
            self.category.as_deref(),
            "Category must be one of: Warranty, AMC, CMC, ZefEdge, Office Consumption, T&M, Part Repair",
        );
        v.one_of::<RequestPurpose>(
            "purpose",
            self.purpose.as_deref(),
            "Purpose must be one of: Troubleshooting, Loan, Sale, Warranty Replacement, Refurbint, Refurbext",
        );
        v.one_of::<RequestBasis>(
            "basis",
            self.basis.as_deref(),
            "Basis must be either Returnable or Non-returnable",
        );

        if v.check(
            "partsRequested",
            !self.parts_requested.is_empty(),
            "At least one part item is required",
        ) {
            for (i, item) in self.parts_requested.iter().enumerate() {
                v.extend_prefixed(&format!("partsRequested.{}", i), item.validate());
            }
        }

        v.one_of::<RequestStatus>("status", self.status.as_deref(), "Invalid status value");
        v.one_of::<Priority>(
            "priority",
            self.priority.as_deref(),
            "Priority must be Low, Medium, High, or Critical",
        );
        v.max_len("notes", self.notes.as_deref(), 1000, "Notes cannot exceed 1000 characters");

        if let Some(ret) = &self.return_details {
            ret.validate_into(&mut v);
        }

        v
    }

    /// Normalize, attribute, validate against `now` and build the record
    pub fn into_request(
        mut self,
        actor: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<PartRequest, Violations> {
        self.normalize();
        self.attribute_to(actor);
        self.validate(now).finish()?;
        Ok(self.build(now))
    }

    fn build(self, now: DateTime<Utc>) -> PartRequest {
        let engineer = self
            .prepared_by
            .and_then(|p| p.service_engineer)
            .unwrap_or_default();
        let approved_by = self
            .approved_by
            .and_then(|a| a.national_manager)
            .map(|m| ApprovedBy {
                national_manager: Signoff {
                    name: m.name,
                    date: m.date,
                },
            });
        let parts_requested: Vec<PartLineItem> =
            self.parts_requested.into_iter().map(LineItemDraft::build).collect();

        PartRequest {
            id: uuid::Uuid::new_v4().to_string(),
            date: self.date.unwrap_or(now),
            engineer_name: self.engineer_name,
            estimated_date_of_return: self.estimated_date_of_return,
            customer_name: self.customer_name,
            customer_contact_details: self.customer_contact_details.unwrap_or_default(),
            instrument_model: self.instrument_model,
            instrument_serial_number: self.instrument_serial_number,
            category: self.category.as_deref().and_then(|s| s.parse().ok()),
            purpose: self.purpose.as_deref().and_then(|s| s.parse().ok()),
            basis: self.basis.as_deref().and_then(|s| s.parse().ok()),
            total_items: parts_requested.len() as u32,
            parts_requested,
            status: self
                .status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            prepared_by: PreparedBy {
                service_engineer: Signoff {
                    name: engineer.name,
                    date: Some(engineer.date.unwrap_or(now)),
                },
            },
            approved_by,
            priority: self
                .priority
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            notes: self.notes,
            dispatch_details: self.dispatch_details.map(DispatchDraft::build),
            return_details: self.return_details.map(ReturnDraft::build),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A move along the request lifecycle, with the details the target state
/// records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: Option<String>,
    /// Approver's name for Approved / Partially Approved
    pub approver_name: Option<String>,
    pub dispatch_details: Option<DispatchDraft>,
    pub return_details: Option<ReturnDraft>,
}

impl StatusChange {
    /// Validate the move against the lifecycle and record it on `request`
    pub fn apply(mut self, request: &mut PartRequest, actor: &str, now: DateTime<Utc>) -> Result<()> {
        let mut v = Violations::new("PartRequest");
        let raw = tidy(self.status.take());
        let parsed = raw.as_deref().map(str::parse::<RequestStatus>);
        match &parsed {
            None => {
                v.add("status", "Status is required");
            }
            Some(Err(_)) => {
                v.add("status", "Invalid status value");
            }
            Some(Ok(_)) => {}
        }
        if let Some(ret) = self.return_details.as_mut() {
            ret.normalize();
            ret.validate_into(&mut v);
        }

        let to = match parsed {
            Some(Ok(to)) if v.is_empty() => to,
            _ => return Err(Error::Validation(v)),
        };
        let from = request.status;
        if !from.can_transition_to(to, request.basis) {
            return Err(Error::InvalidTransition { from, to });
        }

        match to {
            RequestStatus::Approved | RequestStatus::PartiallyApproved => {
                let name = tidy(self.approver_name.take()).or_else(|| tidy(Some(actor.to_string())));
                request.approved_by = Some(ApprovedBy {
                    national_manager: Signoff {
                        name,
                        date: Some(now),
                    },
                });
            }
            RequestStatus::Dispatched => {
                let mut draft = self.dispatch_details.take().unwrap_or_default();
                draft.normalize();
                let mut details = draft.build();
                details.dispatch_date.get_or_insert(now);
                if details.dispatched_by.is_none() {
                    details.dispatched_by = tidy(Some(actor.to_string()));
                }
                request.dispatch_details = Some(details);
            }
            RequestStatus::Returned => {
                let mut details = self.return_details.take().unwrap_or_default().build();
                details.actual_return_date.get_or_insert(now);
                request.return_details = Some(details);
            }
            _ => {}
        }

        request.status = to;
        request.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

impl PartRequest {
    /// Persist a new request. `totalItems` is recomputed first.
    pub async fn insert(db: &SqlitePool, request: &mut PartRequest) -> Result<()> {
        request.sync_derived();
        let document = serde_json::to_string(request)?;

        sqlx::query(
            r#"
            INSERT INTO part_requests (id, status, estimated_return, document, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.status.as_str())
        .bind(request.estimated_date_of_return.map(|d| d.to_rfc3339()))
        .bind(&document)
        .bind(request.created_at.to_rfc3339())
        .execute(db)
        .await?;

        Ok(())
    }

    /// Replace the stored document. `totalItems` is recomputed first.
    pub async fn update(db: &SqlitePool, request: &mut PartRequest) -> Result<()> {
        request.sync_derived();
        let document = serde_json::to_string(request)?;

        let result = sqlx::query(
            r#"
            UPDATE part_requests
            SET status = ?, estimated_return = ?, document = ?
            WHERE id = ?
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.estimated_date_of_return.map(|d| d.to_rfc3339()))
        .bind(&document)
        .bind(&request.id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Part request not found".to_string()));
        }
        Ok(())
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<PartRequest>> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, document FROM part_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.document)?)),
            None => Ok(None),
        }
    }

    pub async fn list(db: &SqlitePool) -> Result<Vec<PartRequest>> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT id, document FROM part_requests ORDER BY rowid")
                .fetch_all(db)
                .await?;
        Ok(decode_documents(rows)?)
    }

    pub async fn find_by_status(db: &SqlitePool, status: RequestStatus) -> Result<Vec<PartRequest>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, document FROM part_requests WHERE status = ? ORDER BY rowid",
        )
        .bind(status.as_str())
        .fetch_all(db)
        .await?;
        Ok(decode_documents(rows)?)
    }

    /// Open requests whose estimated return date lies before `now`
    pub async fn find_overdue(db: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<PartRequest>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, document FROM part_requests
            WHERE status NOT IN (?, ?) AND estimated_return IS NOT NULL
            ORDER BY rowid
            "#,
        )
        .bind(RequestStatus::Delivered.as_str())
        .bind(RequestStatus::Returned.as_str())
        .fetch_all(db)
        .await?;

        let requests: Vec<PartRequest> = decode_documents(rows)?;
        Ok(requests.into_iter().filter(|r| r.is_overdue(now)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn draft() -> PartRequestDraft {
        serde_json::from_value(serde_json::json!({
            "engineerName": "Asha Rao",
            "estimatedDateOfReturn": "2026-11-30",
            "customerName": "Acme Labs",
            "customerContactDetails": { "phone": "+91 98765 43210", "email": "ops@acme.test" },
            "instrumentModel": "HPLC-9",
            "instrumentSerialNumber": "hp-00912",
            "category": "Warranty",
            "purpose": "Troubleshooting",
            "basis": "Returnable",
            "partsRequested": [
                { "serialNumber": 1, "partNumber": "pmp-1", "quantity": 2 },
                { "serialNumber": 2, "materialDescription": "Seal kit", "quantity": 3 }
            ],
            "totalItems": 99
        }))
        .unwrap()
    }

    fn request() -> PartRequest {
        draft().into_request("Asha Rao", now()).unwrap()
    }

    #[test]
    fn test_defaults_and_derived_counts() {
        let r = request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert_eq!(r.priority, Priority::Medium);
        assert_eq!(r.total_items, 2);
        assert_eq!(r.total_quantity(), 5);
        assert_eq!(r.date, now());
        assert_eq!(r.instrument_serial_number.as_deref(), Some("HP-00912"));
        assert_eq!(r.parts_requested[0].part_number.as_deref(), Some("PMP-1"));
        assert_eq!(r.parts_requested[0].remarks, "");
        assert_eq!(r.prepared_by.service_engineer.name.as_deref(), Some("Asha Rao"));
        assert_eq!(r.prepared_by.service_engineer.date, Some(now()));
        assert_eq!(r.category, Some(RequestCategory::Warranty));
    }

    #[test]
    fn test_empty_parts_rejected() {
        let mut d = draft();
        d.parts_requested.clear();
        let err = d.into_request("Asha Rao", now()).unwrap_err();
        assert!(err.has("partsRequested"));
        assert!(err.to_string().contains("At least one part item is required"));
    }

    #[test]
    fn test_line_item_rules() {
        let mut d = draft();
        d.parts_requested = vec![
            LineItemDraft {
                serial_number: Some(0.0),
                quantity: Some(0.0),
                ..Default::default()
            },
            LineItemDraft {
                serial_number: Some(2.0),
                quantity: Some(1.5),
                part_number: Some("ab".to_string()),
                remarks: Some("r".repeat(301)),
                ..Default::default()
            },
            LineItemDraft {
                serial_number: Some(3.0),
                ..Default::default()
            },
        ];
        let err = d.into_request("Asha Rao", now()).unwrap_err();
        assert!(err.has("partsRequested.0.serialNumber"));
        assert!(err.has("partsRequested.0.quantity"));
        assert!(err.has("partsRequested.1.quantity"));
        assert!(err.has("partsRequested.1.partNumber"));
        assert!(err.has("partsRequested.1.remarks"));
        assert!(err.has("partsRequested.2.quantity"));
        assert!(!err.has("partsRequested.2.serialNumber"));
    }

    #[test]
    fn test_oversized_line_item_counts_rejected() {
        let mut d = draft();
        d.parts_requested = vec![LineItemDraft {
            serial_number: Some(1e12),
            quantity: Some(1e12),
            ..Default::default()
        }];
        let err = d.into_request("Asha Rao", now()).unwrap_err();
        assert!(err.has("partsRequested.0.serialNumber"));
        assert!(err.iter().any(|x| x.message == "Quantity is too large"));
    }

    #[test]
    fn test_estimated_return_must_be_future() {
        let mut d = draft();
        d.estimated_date_of_return = Some(now());
        let err = d.into_request("Asha Rao", now()).unwrap_err();
        assert!(err.has("estimatedDateOfReturn"));

        let mut d = draft();
        d.estimated_date_of_return = Some(now() - Duration::days(1));
        assert!(d.into_request("Asha Rao", now()).is_err());
    }

    #[test]
    fn test_enum_and_contact_messages() {
        let mut d = draft();
        d.category = Some("Goodwill".to_string());
        d.basis = Some("returnable".to_string());
        d.priority = Some("Urgent".to_string());
        d.customer_contact_details = Some(ContactDetails {
            phone: Some("12345".to_string()),
            email: Some("nobody".to_string()),
            address: None,
        });
        d.return_details = Some(ReturnDraft {
            return_condition: Some("Shiny".to_string()),
            ..Default::default()
        });

        let err = d.into_request("Asha Rao", now()).unwrap_err();
        let messages: Vec<&str> = err.iter().map(|x| x.message.as_str()).collect();
        assert!(messages.contains(&"Please enter a valid phone number"));
        assert!(messages.contains(&"Please enter a valid email address"));
        assert!(messages.contains(&"Basis must be either Returnable or Non-returnable"));
        assert!(messages.contains(&"Priority must be Low, Medium, High, or Critical"));
        assert!(messages
            .contains(&"`Shiny` is not a valid enum value for path `returnDetails.returnCondition`."));
        assert!(err.has("category"));
    }

    #[test]
    fn test_overdue() {
        let mut r = request();
        let due = r.estimated_date_of_return.unwrap();
        assert!(!r.is_overdue(due));
        assert!(r.is_overdue(due + Duration::seconds(1)));

        for status in [RequestStatus::Delivered, RequestStatus::Returned] {
            r.status = status;
            assert!(!r.is_overdue(due + Duration::days(30)));
        }

        r.status = RequestStatus::Dispatched;
        r.estimated_date_of_return = None;
        assert!(!r.is_overdue(due + Duration::days(30)));
    }

    #[test]
    fn test_view_adds_derived_fields() {
        let view = PartRequestView::at(request(), now());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["totalQuantity"], 5);
        assert_eq!(json["isOverdue"], false);
        assert_eq!(json["totalItems"], 2);
        assert_eq!(json["status"], "Pending");
        assert!(json.get("_id").is_some());
    }

    #[test]
    fn test_transition_graph() {
        use RequestStatus::*;
        let returnable = Some(RequestBasis::Returnable);
        assert!(Pending.can_transition_to(Approved, returnable));
        assert!(Pending.can_transition_to(PartiallyApproved, returnable));
        assert!(Pending.can_transition_to(Rejected, returnable));
        assert!(PartiallyApproved.can_transition_to(Dispatched, returnable));
        assert!(Dispatched.can_transition_to(Delivered, returnable));
        assert!(Delivered.can_transition_to(Returned, returnable));

        assert!(!Delivered.can_transition_to(Returned, Some(RequestBasis::NonReturnable)));
        assert!(!Delivered.can_transition_to(Returned, None));
        assert!(!Pending.can_transition_to(Dispatched, returnable));
        assert!(!Rejected.can_transition_to(Approved, returnable));
        assert!(!Returned.can_transition_to(Pending, returnable));
    }

    #[test]
    fn test_status_change_records_details() {
        let mut r = request();
        let later = now() + Duration::hours(1);

        StatusChange {
            status: Some("Approved".to_string()),
            ..Default::default()
        }
        .apply(&mut r, "Meera Iyer", later)
        .unwrap();
        assert_eq!(r.status, RequestStatus::Approved);
        let manager = &r.approved_by.as_ref().unwrap().national_manager;
        assert_eq!(manager.name.as_deref(), Some("Meera Iyer"));
        assert_eq!(manager.date, Some(later));

        StatusChange {
            status: Some("Dispatched".to_string()),
            dispatch_details: Some(DispatchDraft {
                courier_service: Some("BlueDart".to_string()),
                tracking_number: Some("BD123".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
        .apply(&mut r, "Stores Desk", later)
        .unwrap();
        let dispatch = r.dispatch_details.as_ref().unwrap();
        assert_eq!(dispatch.dispatch_date, Some(later));
        assert_eq!(dispatch.dispatched_by.as_deref(), Some("Stores Desk"));

        for status in ["Delivered", "Returned"] {
            StatusChange {
                status: Some(status.to_string()),
                return_details: Some(ReturnDraft {
                    return_condition: Some("Good".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }
            .apply(&mut r, "Asha Rao", later)
            .unwrap();
        }
        assert_eq!(r.status, RequestStatus::Returned);
        let ret = r.return_details.as_ref().unwrap();
        assert_eq!(ret.return_condition, Some(ReturnCondition::Good));
        assert_eq!(ret.actual_return_date, Some(later));
        assert_eq!(r.updated_at, later);
    }

    #[test]
    fn test_illegal_status_change() {
        let mut r = request();
        let err = StatusChange {
            status: Some("Delivered".to_string()),
            ..Default::default()
        }
        .apply(&mut r, "Asha Rao", now())
        .unwrap_err();
        assert_eq!(err.to_string(), "Cannot change status from Pending to Delivered");
        assert_eq!(r.status, RequestStatus::Pending);

        let err = StatusChange {
            status: Some("Lost".to_string()),
            ..Default::default()
        }
        .apply(&mut r, "Asha Rao", now())
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
