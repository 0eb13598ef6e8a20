//! DNS subsystem.
//!
//! # Data Flow
//! ```text
//! (fqdn, hosted zone)
//!     → record_name.rs (relative name, apex detection)
//!     → zone.rs (reject names outside the zone)
//!     → record.rs (record sets, alias records for other constructs)
//!     → certificate.rs (ACM certificate with DNS validation)
//! ```
//!
//! # Design Decisions
//! - Exactly one implementation of the relative name derivation
//! - The pure helper passes unrelated names through; constructs turn that into an error

pub mod certificate;
pub mod record;
pub mod record_name;
pub mod zone;

pub use certificate::{CertificateConstruct, CertificateProps};
pub use record::{add_alias_records, AliasTarget, DnsRecordConstruct, DnsRecordProps};
pub use record_name::{is_within_zone, normalize_domain, to_route53_record_name};
pub use zone::HostedZone;
