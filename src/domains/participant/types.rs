use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Column type of a filterable sub-record attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Bool,
}

/// Cardinality of a participant association
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

/// Every kind of sub-record a participant owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubRecordKind {
    Name,
    DateOfBirth,
    SocialSecurityNumber,
    Address,
    Email,
    Phone,
    HealthInsuranceBeneficiaryNumber,
    IpAddressNumber,
    MedicalRecordNumber,
}

impl SubRecordKind {
    pub const ALL: [SubRecordKind; 9] = [
        SubRecordKind::Name,
        SubRecordKind::DateOfBirth,
        SubRecordKind::SocialSecurityNumber,
        SubRecordKind::Address,
        SubRecordKind::Email,
        SubRecordKind::Phone,
        SubRecordKind::HealthInsuranceBeneficiaryNumber,
        SubRecordKind::IpAddressNumber,
        SubRecordKind::MedicalRecordNumber,
    ];

    /// Association name as it appears in payloads and filter paths
    pub fn as_str(&self) -> &'static str {
        match self {
            SubRecordKind::Name => "name",
            SubRecordKind::DateOfBirth => "date_of_birth",
            SubRecordKind::SocialSecurityNumber => "social_security_number",
            SubRecordKind::Address => "addresses",
            SubRecordKind::Email => "emails",
            SubRecordKind::Phone => "phones",
            SubRecordKind::HealthInsuranceBeneficiaryNumber => "health_insurance_beneficiary_numbers",
            SubRecordKind::IpAddressNumber => "ip_address_numbers",
            SubRecordKind::MedicalRecordNumber => "medical_record_numbers",
        }
    }

    pub fn from_association(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    pub fn table(&self) -> &'static str {
        match self {
            SubRecordKind::Name => "names",
            SubRecordKind::DateOfBirth => "date_of_births",
            SubRecordKind::SocialSecurityNumber => "social_security_numbers",
            SubRecordKind::Address => "addresses",
            SubRecordKind::Email => "emails",
            SubRecordKind::Phone => "phones",
            SubRecordKind::HealthInsuranceBeneficiaryNumber => "health_insurance_beneficiary_numbers",
            SubRecordKind::IpAddressNumber => "ip_address_numbers",
            SubRecordKind::MedicalRecordNumber => "medical_record_numbers",
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            SubRecordKind::Name | SubRecordKind::DateOfBirth | SubRecordKind::SocialSecurityNumber => {
                Cardinality::OneToOne
            }
            _ => Cardinality::OneToMany,
        }
    }

    /// Attributes clients may read, write and filter on
    pub fn columns(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            SubRecordKind::Name => &[
                ("first_name", ColumnType::Text),
                ("middle_name", ColumnType::Text),
                ("last_name", ColumnType::Text),
                ("prefix", ColumnType::Text),
                ("suffix", ColumnType::Text),
            ],
            SubRecordKind::DateOfBirth => &[("date", ColumnType::Text)],
            SubRecordKind::Address => &[
                ("name", ColumnType::Text),
                ("street_1", ColumnType::Text),
                ("street_2", ColumnType::Text),
                ("city", ColumnType::Text),
                ("state", ColumnType::Text),
                ("zip", ColumnType::Text),
                ("primary", ColumnType::Bool),
            ],
            SubRecordKind::Email => &[("email", ColumnType::Text)],
            SubRecordKind::Phone => &[
                ("name", ColumnType::Text),
                ("number", ColumnType::Text),
                ("primary", ColumnType::Bool),
            ],
            SubRecordKind::SocialSecurityNumber
            | SubRecordKind::HealthInsuranceBeneficiaryNumber
            | SubRecordKind::IpAddressNumber
            | SubRecordKind::MedicalRecordNumber => &[("number", ColumnType::Text)],
        }
    }

    pub fn column(&self, attribute: &str) -> Option<(&'static str, ColumnType)> {
        self.columns().iter().copied().find(|(name, _)| *name == attribute)
    }
}

impl fmt::Display for SubRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stored sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Name {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DateOfBirth {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Address {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub name: Option<String>,
    pub street_1: Option<String>,
    pub street_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Email {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Phone {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub name: Option<String>,
    pub number: String,
    pub primary: bool,
}

/// Single-value identifier sub-record (SSN, HIB number, IP address number, MRN)
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RecordNumber {
    #[serde(skip_serializing)]
    pub participant_id: i64,
    pub number: String,
}

pub type SocialSecurityNumber = RecordNumber;
pub type HealthInsuranceBeneficiaryNumber = RecordNumber;
pub type IpAddressNumber = RecordNumber;
pub type MedicalRecordNumber = RecordNumber;

/// Participant entity with its sub-records loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: i64,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: Option<Name>,
    pub date_of_birth: Option<DateOfBirth>,
    pub social_security_number: Option<SocialSecurityNumber>,
    pub addresses: Vec<Address>,
    pub emails: Vec<Email>,
    pub phones: Vec<Phone>,
    pub health_insurance_beneficiary_numbers: Vec<HealthInsuranceBeneficiaryNumber>,
    pub ip_address_numbers: Vec<IpAddressNumber>,
    pub medical_record_numbers: Vec<MedicalRecordNumber>,
}

/// ParticipantRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantRow {
    pub id: i64,
    pub external_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ParticipantRow {
    /// Convert database row to domain entity (sub-records are attached by the repository)
    pub fn into_entity(self) -> DomainResult<Participant> {
        let parse_datetime = |s: &str, field_name: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid RFC3339 in {}: {}", field_name, s)))
        };

        let external_id = self.external_id.ok_or_else(|| {
            DomainError::Internal(format!("participant {} has no external id", self.id))
        })?;

        Ok(Participant {
            id: self.id,
            external_id,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
            name: None,
            date_of_birth: None,
            social_security_number: None,
            addresses: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
            health_insurance_beneficiary_numbers: Vec::new(),
            ip_address_numbers: Vec::new(),
            medical_record_numbers: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NameAttributes {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DateOfBirthAttributes {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AddressAttributes {
    pub name: Option<String>,
    pub street_1: Option<String>,
    pub street_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmailAttributes {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PhoneAttributes {
    pub name: Option<String>,
    pub number: Option<String>,
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordNumberAttributes {
    pub number: Option<String>,
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Nested attributes accepted on create and update.
///
/// A key that is absent leaves that kind of sub-record untouched. A key that is
/// present replaces every existing sub-record of that kind: `null` clears a
/// one-to-one record, `[]` clears a one-to-many list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParticipantAttributes {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<NameAttributes>>,
    #[serde(default, deserialize_with = "present")]
    pub date_of_birth: Option<Option<DateOfBirthAttributes>>,
    #[serde(default, deserialize_with = "present")]
    pub social_security_number: Option<Option<RecordNumberAttributes>>,
    #[serde(default)]
    pub addresses: Option<Vec<AddressAttributes>>,
    #[serde(default)]
    pub emails: Option<Vec<EmailAttributes>>,
    #[serde(default)]
    pub phones: Option<Vec<PhoneAttributes>>,
    #[serde(default)]
    pub health_insurance_beneficiary_numbers: Option<Vec<RecordNumberAttributes>>,
    #[serde(default)]
    pub ip_address_numbers: Option<Vec<RecordNumberAttributes>>,
    #[serde(default)]
    pub medical_record_numbers: Option<Vec<RecordNumberAttributes>>,
}

/// One "replace all records of this kind" instruction
#[derive(Debug, Clone, PartialEq)]
pub enum NestedWrite {
    Name(Option<NameAttributes>),
    DateOfBirth(Option<DateOfBirthAttributes>),
    SocialSecurityNumber(Option<RecordNumberAttributes>),
    Addresses(Vec<AddressAttributes>),
    Emails(Vec<EmailAttributes>),
    Phones(Vec<PhoneAttributes>),
    HealthInsuranceBeneficiaryNumbers(Vec<RecordNumberAttributes>),
    IpAddressNumbers(Vec<RecordNumberAttributes>),
    MedicalRecordNumbers(Vec<RecordNumberAttributes>),
}

impl NestedWrite {
    pub fn kind(&self) -> SubRecordKind {
        match self {
            NestedWrite::Name(_) => SubRecordKind::Name,
            NestedWrite::DateOfBirth(_) => SubRecordKind::DateOfBirth,
            NestedWrite::SocialSecurityNumber(_) => SubRecordKind::SocialSecurityNumber,
            NestedWrite::Addresses(_) => SubRecordKind::Address,
            NestedWrite::Emails(_) => SubRecordKind::Email,
            NestedWrite::Phones(_) => SubRecordKind::Phone,
            NestedWrite::HealthInsuranceBeneficiaryNumbers(_) => SubRecordKind::HealthInsuranceBeneficiaryNumber,
            NestedWrite::IpAddressNumbers(_) => SubRecordKind::IpAddressNumber,
            NestedWrite::MedicalRecordNumbers(_) => SubRecordKind::MedicalRecordNumber,
        }
    }
}

impl ParticipantAttributes {
    pub fn is_empty(&self) -> bool {
        self.clone().into_writes().is_empty()
    }

    /// Flatten the payload into replace instructions, one per submitted kind
    pub fn into_writes(self) -> Vec<NestedWrite> {
        let mut writes = Vec::new();
        if let Some(v) = self.name {
            writes.push(NestedWrite::Name(v));
        }
        if let Some(v) = self.date_of_birth {
            writes.push(NestedWrite::DateOfBirth(v));
        }
        if let Some(v) = self.social_security_number {
            writes.push(NestedWrite::SocialSecurityNumber(v));
        }
        if let Some(v) = self.addresses {
            writes.push(NestedWrite::Addresses(v));
        }
        if let Some(v) = self.emails {
            writes.push(NestedWrite::Emails(v));
        }
        if let Some(v) = self.phones {
            writes.push(NestedWrite::Phones(v));
        }
        if let Some(v) = self.health_insurance_beneficiary_numbers {
            writes.push(NestedWrite::HealthInsuranceBeneficiaryNumbers(v));
        }
        if let Some(v) = self.ip_address_numbers {
            writes.push(NestedWrite::IpAddressNumbers(v));
        }
        if let Some(v) = self.medical_record_numbers {
            writes.push(NestedWrite::MedicalRecordNumbers(v));
        }
        writes
    }
}

const MAX_NAME_PART: usize = 100;
const MAX_FIELD: usize = 255;
const MAX_NUMBER: usize = 64;

fn check_number(validator: &mut NestedValidator, field: &str, value: &Option<String>) {
    validator.check(
        ValidationBuilder::new(field, value.clone())
            .required()
            .max_length(MAX_NUMBER),
    );
}

fn check_single_primary<'a>(
    validator: &mut NestedValidator,
    field: &str,
    flags: impl Iterator<Item = &'a Option<bool>>,
) {
    if flags.filter(|p| **p == Some(true)).count() > 1 {
        validator.add_error(ValidationError::invalid_value(field, "only one entry may be primary"));
    }
}

impl Validate for ParticipantAttributes {
    fn validate(&self) -> DomainResult<()> {
        let mut v = NestedValidator::new();

        if let Some(Some(name)) = &self.name {
            let parts = [
                ("name.first_name", &name.first_name),
                ("name.middle_name", &name.middle_name),
                ("name.last_name", &name.last_name),
                ("name.prefix", &name.prefix),
                ("name.suffix", &name.suffix),
            ];
            for (field, value) in parts {
                v.check(ValidationBuilder::new(field, value.clone()).max_length(MAX_NAME_PART));
            }
            let has_name = [&name.first_name, &name.last_name]
                .iter()
                .any(|s| s.as_deref().map_or(false, |s| !s.trim().is_empty()));
            if !has_name {
                v.add_error(ValidationError::required("name.first_name"));
            }
        }

        if let Some(Some(dob)) = &self.date_of_birth {
            v.check(
                ValidationBuilder::new("date_of_birth.date", dob.date.clone())
                    .required()
                    .past_date(),
            );
        }

        if let Some(Some(ssn)) = &self.social_security_number {
            v.check(
                ValidationBuilder::new("social_security_number.number", ssn.number.clone())
                    .required()
                    .social_security_number(),
            );
        }

        if let Some(addresses) = &self.addresses {
            for (i, address) in addresses.iter().enumerate() {
                let fields = [
                    ("name", &address.name),
                    ("street_1", &address.street_1),
                    ("street_2", &address.street_2),
                    ("city", &address.city),
                    ("state", &address.state),
                    ("zip", &address.zip),
                ];
                for (field, value) in fields {
                    v.check(
                        ValidationBuilder::new(&format!("addresses[{}].{}", i, field), value.clone())
                            .max_length(MAX_FIELD),
                    );
                }
                let locatable = [&address.street_1, &address.city, &address.zip]
                    .iter()
                    .any(|s| s.as_deref().map_or(false, |s| !s.trim().is_empty()));
                if !locatable {
                    v.add_error(ValidationError::required(&format!("addresses[{}].street_1", i)));
                }
            }
            check_single_primary(&mut v, "addresses", addresses.iter().map(|a| &a.primary));
        }

        if let Some(emails) = &self.emails {
            for (i, email) in emails.iter().enumerate() {
                v.check(
                    ValidationBuilder::new(&format!("emails[{}].email", i), email.email.clone())
                        .required()
                        .max_length(MAX_FIELD)
                        .email(),
                );
            }
        }

        if let Some(phones) = &self.phones {
            for (i, phone) in phones.iter().enumerate() {
                v.check(
                    ValidationBuilder::new(&format!("phones[{}].number", i), phone.number.clone())
                        .required()
                        .phone(),
                );
                v.check(
                    ValidationBuilder::new(&format!("phones[{}].name", i), phone.name.clone())
                        .max_length(MAX_FIELD),
                );
            }
            check_single_primary(&mut v, "phones", phones.iter().map(|p| &p.primary));
        }

        let number_lists = [
            ("health_insurance_beneficiary_numbers", &self.health_insurance_beneficiary_numbers),
            ("ip_address_numbers", &self.ip_address_numbers),
            ("medical_record_numbers", &self.medical_record_numbers),
        ];
        for (association, list) in number_lists {
            if let Some(list) = list {
                for (i, entry) in list.iter().enumerate() {
                    check_number(&mut v, &format!("{}[{}].number", association, i), &entry.number);
                }
            }
        }

        v.validate()
    }
}

/// Request envelope: `{"participants": {...}}`, `participant` accepted as alias.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantEnvelope {
    #[serde(default, alias = "participant")]
    pub participants: Option<ParticipantAttributes>,
}

impl ParticipantEnvelope {
    pub fn into_attributes(self) -> ParticipantAttributes {
        self.participants.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// What the caller asked for within its scope
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Everything visible
    All,
    /// One participant by its public identifier
    ExternalId(String),
    /// Legacy lookup by internal key
    ParticipantId(i64),
    /// Conjunction of dotted-path filters
    Filters(Vec<crate::domains::participant::filter::FilterExpr>),
}

/// Full representation: `id` is the external identifier and sub-records are embedded
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantResponse {
    pub id: String,
    pub name: Option<Name>,
    pub date_of_birth: Option<DateOfBirth>,
    pub social_security_number: Option<SocialSecurityNumber>,
    pub addresses: Vec<Address>,
    pub emails: Vec<Email>,
    pub phones: Vec<Phone>,
    pub health_insurance_beneficiary_numbers: Vec<HealthInsuranceBeneficiaryNumber>,
    pub ip_address_numbers: Vec<IpAddressNumber>,
    pub medical_record_numbers: Vec<MedicalRecordNumber>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            id: p.external_id,
            name: p.name,
            date_of_birth: p.date_of_birth,
            social_security_number: p.social_security_number,
            addresses: p.addresses,
            emails: p.emails,
            phones: p.phones,
            health_insurance_beneficiary_numbers: p.health_insurance_beneficiary_numbers,
            ip_address_numbers: p.ip_address_numbers,
            medical_record_numbers: p.medical_record_numbers,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// Flat representation served by the legacy API
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    pub id: i64,
    pub external_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Participant> for ParticipantSummary {
    fn from(p: Participant) -> Self {
        Self {
            id: p.id,
            external_id: p.external_id,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}
