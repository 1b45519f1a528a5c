use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Tag;
use der::Tagged;
use der::asn1::{Any, Ia5StringRef, PrintableStringRef, SetOfVec, Utf8StringRef};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::error::{CaError, Result};
use crate::key::PublicKey;

const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Clock-skew allowance applied to the start of every validity window.
pub const BACKDATE: Duration = Duration::days(30);

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `key_usage` - Key usage bits requested in addition to those implied by `usages`.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `dns_names` - DNS names placed in the subject alternative name extension.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Only the attributes that are set are encoded, in the order
/// C, O, OU, CN.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let mut rdns = Vec::with_capacity(4);
        if let Some(country) = &self.country {
            let value = PrintableStringRef::new(country)
                .map_err(|e| CaError::InvalidInput(format!("country {country:?}: {e}")))?;
            rdns.push(single_attribute_rdn(COUNTRY_NAME, Any::encode_from(&value)?)?);
        }
        if let Some(organization) = &self.organization {
            rdns.push(utf8_rdn(ORGANIZATION_NAME, organization)?);
        }
        if let Some(unit) = &self.organization_unit {
            rdns.push(utf8_rdn(ORGANIZATIONAL_UNIT_NAME, unit)?);
        }
        rdns.push(utf8_rdn(COMMON_NAME, &self.common_name)?);
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes other than C, O, OU and CN are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut name = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let slot = match attr.oid {
                    COMMON_NAME => {
                        name.common_name = decode_string(&attr.value)?;
                        continue;
                    }
                    COUNTRY_NAME => &mut name.country,
                    ORGANIZATION_NAME => &mut name.organization,
                    ORGANIZATIONAL_UNIT_NAME => &mut name.organization_unit,
                    _ => continue,
                };
                *slot = Some(decode_string(&attr.value)?);
            }
        }
        Ok(name)
    }
}

fn utf8_rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let value = Utf8StringRef::new(value)?;
    single_attribute_rdn(oid, Any::encode_from(&value)?)
}

fn single_attribute_rdn(oid: ObjectIdentifier, value: Any) -> Result<RelativeDistinguishedName> {
    let attribute = AttributeTypeAndValue { oid, value };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![attribute])?))
}

fn decode_string(value: &Any) -> Result<String> {
    let decoded = match value.tag() {
        Tag::Utf8String => value.decode_as::<Utf8StringRef<'_>>()?.as_str().to_string(),
        Tag::PrintableString => value
            .decode_as::<PrintableStringRef<'_>>()?
            .as_str()
            .to_string(),
        Tag::Ia5String => value.decode_as::<Ia5StringRef<'_>>()?.as_str().to_string(),
        other => {
            return Err(CaError::DecodingError(format!(
                "unsupported name attribute encoding: {other}"
            )));
        }
    };
    Ok(decoded)
}

/// Certificate validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            not_before: now,
            not_after: offset(now, Duration::days(days))?,
        })
    }

    /// A window starting [`BACKDATE`] in the past and ending `valid_for` from now.
    ///
    /// Fails with [`CaError::InvalidInput`] when either end falls outside the
    /// representable date range.
    pub fn backdated(valid_for: Duration) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            not_before: offset(now, -BACKDATE)?,
            not_after: offset(now, valid_for)?,
        })
    }
}

fn offset(base: OffsetDateTime, by: Duration) -> Result<OffsetDateTime> {
    base.checked_add(by)
        .ok_or_else(|| CaError::InvalidInput(format!("validity offset {by} is out of range")))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

}
