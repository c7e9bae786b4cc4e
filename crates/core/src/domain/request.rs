use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const COMMENT_MAX_CHARS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aprobado")]
    Approved,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Approved => "aprobado",
            Self::Rejected => "rechazado",
        }
    }

    /// Terminal decision values a supervisor may move a request to.
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pendiente" => Ok(Self::Pending),
            "aprobado" => Ok(Self::Approved),
            "rechazado" => Ok(Self::Rejected),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestComment {
    pub id: CommentId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub request_id: RequestId,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequestComment {
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub request_id: RequestId,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    pub title: Option<String>,
    pub description: String,
    pub status: RequestStatus,
    pub amount: Decimal,
    pub expected_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    pub supervisor_id: Option<UserId>,
    pub version: i64,
    #[serde(default)]
    pub comments: Vec<RequestComment>,
}

impl PurchaseRequest {
    /// Moves `updated_at` forward without ever placing it before `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Payload accepted when an owner submits a new request. Status is not part of
/// the payload; every request starts out pending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
}

impl NewPurchaseRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(title) = &self.title {
            check_length("title", title, TITLE_MAX_CHARS)?;
        }
        check_description(&self.description)?;
        check_amount(self.amount)
    }
}

/// Partial update over a request. Unset fields are left untouched. This path
/// does not go through the approval workflow.
///
/// The nullable columns (`title`, `expected_date`, `supervisor_id`) use
/// `Option<Option<T>>`: `None` = no change, `Some(None)` = clear (JSON `null`),
/// `Some(Some(v))` = set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPatch {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub expected_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<Option<UserId>>,
}

/// A present field, `null` included, becomes `Some`; an absent one falls back
/// to the `#[serde(default)]` `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RequestPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(Some(title)) = &self.title {
            check_length("title", title, TITLE_MAX_CHARS)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(status) = &self.status {
            status.parse::<RequestStatus>()?;
        }
        if let Some(amount) = self.amount {
            check_amount(amount)?;
        }
        Ok(())
    }

    /// True when the patch touches fields normally owned by the approval workflow.
    pub fn overrides_workflow(&self) -> bool {
        self.status.is_some() || self.supervisor_id.is_some()
    }

    pub fn apply_to(
        &self,
        request: &mut PurchaseRequest,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.validate()?;

        if let Some(title) = &self.title {
            request.title = title.clone();
        }
        if let Some(description) = &self.description {
            request.description = description.clone();
        }
        if let Some(status) = &self.status {
            request.status = status.parse()?;
        }
        if let Some(amount) = self.amount {
            request.amount = amount;
        }
        if let Some(expected_date) = self.expected_date {
            request.expected_date = expected_date;
        }
        if let Some(supervisor_id) = self.supervisor_id {
            request.supervisor_id = supervisor_id;
        }
        request.touch(now);
        Ok(())
    }
}

pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), DomainError> {
    if value.chars().count() > max_chars {
        return Err(DomainError::FieldTooLong { field, max_chars });
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), DomainError> {
    if description.trim().is_empty() {
        return Err(DomainError::MissingField("description"));
    }
    check_length("description", description, DESCRIPTION_MAX_CHARS)
}

fn check_amount(amount: Decimal) -> Result<(), DomainError> {
    if amount < Decimal::ZERO {
        return Err(DomainError::NegativeAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{
        NewPurchaseRequest, PurchaseRequest, RequestId, RequestPatch, RequestStatus,
        DESCRIPTION_MAX_CHARS,
    };
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    fn request() -> PurchaseRequest {
        let now = Utc::now();
        PurchaseRequest {
            id: RequestId(1),
            title: Some("Chair".to_string()),
            description: "office chair".to_string(),
            status: RequestStatus::Pending,
            amount: Decimal::new(100, 0),
            expected_date: None,
            created_at: now,
            updated_at: now,
            user_id: UserId(7),
            supervisor_id: None,
            version: 1,
            comments: Vec::new(),
        }
    }

    #[test]
    fn status_uses_spanish_wire_names() {
        assert_eq!("aprobado".parse::<RequestStatus>(), Ok(RequestStatus::Approved));
        assert_eq!(RequestStatus::Rejected.as_str(), "rechazado");
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).expect("serialize"),
            "\"pendiente\""
        );
        assert_eq!(
            "approved".parse::<RequestStatus>(),
            Err(DomainError::UnknownStatus("approved".to_string()))
        );
        assert!(!RequestStatus::Pending.is_decision());
    }

    #[test]
    fn new_request_rejects_oversized_description_and_negative_amount() {
        let mut payload = NewPurchaseRequest {
            title: None,
            description: "x".repeat(DESCRIPTION_MAX_CHARS + 1),
            amount: Decimal::new(10, 0),
            expected_date: None,
        };
        assert_eq!(
            payload.validate(),
            Err(DomainError::FieldTooLong { field: "description", max_chars: 500 })
        );

        payload.description = "x".repeat(DESCRIPTION_MAX_CHARS);
        assert!(payload.validate().is_ok());

        payload.amount = Decimal::new(-1, 0);
        assert!(matches!(payload.validate(), Err(DomainError::NegativeAmount(_))));
    }

    #[test]
    fn new_request_ignores_client_supplied_status() {
        let payload: NewPurchaseRequest = serde_json::from_str(
            r#"{"description":"laptop","amount":"900","status":"aprobado"}"#,
        )
        .expect("payload should parse");
        assert_eq!(payload.description, "laptop");
        assert_eq!(payload.amount, Decimal::new(900, 0));
    }

    #[test]
    fn patch_overwrites_only_supplied_fields() {
        let mut target = request();
        let patch = RequestPatch {
            amount: Some(Decimal::new(250, 0)),
            supervisor_id: Some(Some(UserId(3))),
            ..RequestPatch::default()
        };

        patch.apply_to(&mut target, Utc::now()).expect("patch applies");

        assert_eq!(target.amount, Decimal::new(250, 0));
        assert_eq!(target.supervisor_id, Some(UserId(3)));
        assert_eq!(target.description, "office chair");
        assert_eq!(target.status, RequestStatus::Pending);
        assert!(patch.overrides_workflow());
    }

    #[test]
    fn patch_can_set_status_directly_but_not_to_unknown_values() {
        let mut target = request();
        let patch = RequestPatch { status: Some("rechazado".to_string()), ..RequestPatch::default() };
        patch.apply_to(&mut target, Utc::now()).expect("known status applies");
        assert_eq!(target.status, RequestStatus::Rejected);

        let bad = RequestPatch { status: Some("cerrado".to_string()), ..RequestPatch::default() };
        assert!(matches!(bad.apply_to(&mut target, Utc::now()), Err(DomainError::UnknownStatus(_))));
        assert_eq!(target.status, RequestStatus::Rejected);
    }

    #[test]
    fn patch_distinguishes_null_from_omitted_fields() {
        let clearing: RequestPatch =
            serde_json::from_str(r#"{"title":null,"supervisor_id":null,"expected_date":null}"#)
                .expect("patch should parse");
        assert_eq!(clearing.title, Some(None));
        assert_eq!(clearing.supervisor_id, Some(None));
        assert_eq!(clearing.expected_date, Some(None));
        assert!(clearing.overrides_workflow());

        let mut target = request();
        target.supervisor_id = Some(UserId(3));
        target.expected_date = chrono::NaiveDate::from_ymd_opt(2026, 12, 1);
        clearing.apply_to(&mut target, Utc::now()).expect("clearing applies");
        assert_eq!(target.title, None);
        assert_eq!(target.supervisor_id, None);
        assert_eq!(target.expected_date, None);

        let omitted: RequestPatch =
            serde_json::from_str(r#"{"amount":"80"}"#).expect("patch should parse");
        assert_eq!(omitted.title, None);
        assert_eq!(omitted.supervisor_id, None);
        assert!(!omitted.overrides_workflow());

        let mut untouched = request();
        untouched.supervisor_id = Some(UserId(3));
        omitted.apply_to(&mut untouched, Utc::now()).expect("patch applies");
        assert_eq!(untouched.title.as_deref(), Some("Chair"));
        assert_eq!(untouched.supervisor_id, Some(UserId(3)));
        assert_eq!(untouched.amount, Decimal::new(80, 0));
    }

    #[test]
    fn touch_never_moves_updated_at_before_created_at() {
        let mut target = request();
        target.touch(target.created_at - Duration::hours(1));
        assert_eq!(target.updated_at, target.created_at);
    }
}
