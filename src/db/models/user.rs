//! User and credential models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{de_opt_digits, now_rfc3339};
use crate::error::{Error, Result};
use crate::validation::{self, tidy, tidy_lower, Violations, MAX_COUNT};

pub const DEFAULT_PHOTO_URL: &str = "https://geographyandyou.com/images/user-profile.png";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub profession: i64,
    pub region: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: String,
    pub joined_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Name recorded in audit and sign-off fields
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email_id: String,
    pub profession: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub photo_url: String,
    pub joined_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email_id: user.email,
            profession: user.profession,
            region: user.region,
            number: user.phone_number,
            photo_url: user.photo_url,
            joined_date: user.joined_date,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_id: Option<String>,
    pub password: Option<String>,
    pub profession: Option<f64>,
    pub region: Option<String>,
    #[serde(default, deserialize_with = "de_opt_digits")]
    pub number: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_id: String,
    pub password: String,
}

/// Profile fields a user may change about themselves. Anything else
/// (email, password, timestamps) is rejected at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profession: Option<f64>,
    pub region: Option<String>,
    #[serde(default, deserialize_with = "de_opt_digits")]
    pub number: Option<String>,
    pub photo_url: Option<String>,
}

fn check_first_name(v: &mut Violations, value: Option<&str>) {
    v.min_len("firstName", value, 2, "First name must be at least 2 characters");
}

fn check_last_name(v: &mut Violations, value: Option<&str>) {
    v.min_len("lastName", value, 2, "Last name must be at least 2 characters");
}

fn check_profession(v: &mut Violations, value: Option<f64>) {
    v.min_value("profession", value, 0.0, "Profession value cannot be negative");
    v.whole_number("profession", value, "Profession must be a whole number");
    v.max_value("profession", value, MAX_COUNT, "Profession value is too large");
}

fn check_number(v: &mut Violations, value: Option<&str>) {
    if let Some(n) = value {
        v.check(
            "number",
            validation::is_ten_digit_number(n),
            format!("{} is not a valid 10-digit number!", n),
        );
    }
}

fn check_photo_url(v: &mut Violations, value: Option<&str>) {
    if let Some(url) = value {
        v.check(
            "photoUrl",
            validation::is_url(url),
            format!("Invalid Photo URL: {}", url),
        );
    }
}

impl SignupRequest {
    pub fn normalize(&mut self) {
        self.first_name = tidy(self.first_name.take());
        self.last_name = tidy(self.last_name.take());
        self.email_id = tidy_lower(self.email_id.take());
        self.region = tidy(self.region.take());
        self.photo_url = tidy(self.photo_url.take());
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("User");

        if v.required("firstName", self.first_name.as_ref(), "First name is required") {
            check_first_name(&mut v, self.first_name.as_deref());
        }
        if v.required("lastName", self.last_name.as_ref(), "Last name is required") {
            check_last_name(&mut v, self.last_name.as_deref());
        }
        if let Some(email) = self.email_id.as_deref() {
            v.check("emailId", validation::is_email(email), "Please enter a valid email address");
        } else {
            v.add("emailId", "Email ID is required");
        }
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => {
                v.min_len("password", Some(p), 6, "Password must be at least 6 characters");
            }
            _ => {
                v.add("password", "Password is required");
            }
        }
        check_profession(&mut v, self.profession);
        check_number(&mut v, self.number.as_deref());
        check_photo_url(&mut v, self.photo_url.as_deref());

        v
    }
}

impl ProfileUpdate {
    pub fn normalize(&mut self) {
        self.first_name = tidy(self.first_name.take());
        self.last_name = tidy(self.last_name.take());
        self.region = tidy(self.region.take());
        self.photo_url = tidy(self.photo_url.take());
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new("User");
        check_first_name(&mut v, self.first_name.as_deref());
        check_last_name(&mut v, self.last_name.as_deref());
        check_profession(&mut v, self.profession);
        check_number(&mut v, self.number.as_deref());
        check_photo_url(&mut v, self.photo_url.as_deref());
        v
    }
}

impl User {
    /// Insert a validated signup. The email's `UNIQUE` index rejects duplicates.
    pub async fn create(db: &SqlitePool, req: &SignupRequest, password_hash: &str) -> Result<User> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, profession, region, phone_number, photo_url, joined_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(req.first_name.as_deref().unwrap_or_default())
        .bind(req.last_name.as_deref().unwrap_or_default())
        .bind(req.email_id.as_deref().unwrap_or_default())
        .bind(password_hash)
        .bind(req.profession.map(|p| p as i64).unwrap_or(0))
        .bind(&req.region)
        .bind(&req.number)
        .bind(req.photo_url.as_deref().unwrap_or(DEFAULT_PHOTO_URL))
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Lookup by email; the input is normalized the same way stored emails are
    pub async fn get_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Apply a validated profile update; absent fields keep their value
    pub async fn update_profile(db: &SqlitePool, id: &str, update: &ProfileUpdate) -> Result<User> {
        let now = now_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                profession = COALESCE(?, profession),
                region = COALESCE(?, region),
                phone_number = COALESCE(?, phone_number),
                photo_url = COALESCE(?, photo_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.profession.map(|p| p as i64))
        .bind(&update.region)
        .bind(&update.number)
        .bind(&update.photo_url)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UnknownUser);
        }

        Self::get_by_id(db, id).await?.ok_or(Error::UnknownUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupRequest {
        SignupRequest {
            first_name: Some("  Asha ".to_string()),
            last_name: Some("Rao".to_string()),
            email_id: Some(" Asha.Rao@ZefSci.com ".to_string()),
            password: Some("s3cret-pass".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_signup_normalizes_and_validates() {
        let mut req = signup();
        req.normalize();
        assert_eq!(req.first_name.as_deref(), Some("Asha"));
        assert_eq!(req.email_id.as_deref(), Some("asha.rao@zefsci.com"));
        assert!(req.validate().is_empty());
    }

    #[test]
    fn test_signup_requires_core_fields() {
        let req = SignupRequest::default();
        let v = req.validate();
        assert!(v.has("firstName"));
        assert!(v.has("lastName"));
        assert!(v.has("emailId"));
        assert!(v.has("password"));
    }

    #[test]
    fn test_signup_field_rules() {
        let mut req = signup();
        req.first_name = Some("A".to_string());
        req.email_id = Some("not-an-email".to_string());
        req.password = Some("12345".to_string());
        req.profession = Some(-1.0);
        req.number = Some("12345".to_string());
        req.photo_url = Some("nope".to_string());

        let v = req.validate();
        let messages: Vec<&str> = v.iter().map(|x| x.message.as_str()).collect();
        assert!(messages.contains(&"First name must be at least 2 characters"));
        assert!(messages.contains(&"Please enter a valid email address"));
        assert!(messages.contains(&"Password must be at least 6 characters"));
        assert!(messages.contains(&"Profession value cannot be negative"));
        assert!(messages.contains(&"12345 is not a valid 10-digit number!"));
        assert!(messages.contains(&"Invalid Photo URL: nope"));
    }

    #[test]
    fn test_profession_upper_bound() {
        let mut req = signup();
        req.normalize();
        req.profession = Some(1e12);
        let v = req.validate();
        assert!(v.iter().any(|x| x.message == "Profession value is too large"));
    }

    #[test]
    fn test_profile_update_rejects_unknown_fields() {
        let err = serde_json::from_str::<ProfileUpdate>(r#"{"emailId":"x@y.z"}"#);
        assert!(err.is_err());

        let ok: ProfileUpdate =
            serde_json::from_str(r#"{"region":"West","number":"9876543210"}"#).unwrap();
        assert!(ok.validate().is_empty());
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: "u1".to_string(),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: "asha@zefsci.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            profession: 2,
            region: None,
            phone_number: Some("9876543210".to_string()),
            photo_url: DEFAULT_PHOTO_URL.to_string(),
            joined_date: "2026-01-01T00:00:00Z".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(user.full_name(), "Asha Rao");

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["_id"], "u1");
        assert_eq!(json["emailId"], "asha@zefsci.com");
        assert_eq!(json["number"], "9876543210");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password").is_none());
        assert!(json.get("region").is_none());
    }

    #[tokio::test]
    async fn test_number_keeps_leading_zero() {
        let pool = crate::db::memory().await.unwrap();
        let mut req = signup();
        req.number = Some("0123456789".to_string());
        req.normalize();
        assert!(req.validate().is_empty());

        let user = User::create(&pool, &req, "hash").await.unwrap();
        assert_eq!(user.phone_number.as_deref(), Some("0123456789"));

        let update: ProfileUpdate = serde_json::from_str(r#"{"number":"0987654321"}"#).unwrap();
        let updated = User::update_profile(&pool, &user.id, &update).await.unwrap();
        assert_eq!(UserResponse::from(updated).number.as_deref(), Some("0987654321"));
    }
}
