//! Admission allocation engine: per-institution application caps, subject eligibility,
//! decision publication, single-offer acceptance with cascade declines, and FIFO waitlist
//! promotion.

pub mod acceptance;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod ledger;
pub mod memory;
pub mod publisher;
pub mod repository;
pub mod router;
pub mod service;
pub mod waitlist;

#[cfg(test)]
mod tests;

pub use acceptance::{AcceptanceOutcome, CascadeDecline, OfferAcceptanceCoordinator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationView, Course, CourseId,
    CourseRequirement, DecidedBy, Decision, InstitutionId, RequirementError, StatusChange,
    StudentApplicationView, StudentId, SubjectGrades, INSTITUTION_APPLICATION_CAP,
};
pub use eligibility::{EligibilityEvaluator, EligibilityReport, Grade, GradeParseError, Shortfall};
pub use ledger::ApplicationLedger;
pub use memory::{DirectorySeed, InMemoryApplicationStore, InMemoryDirectory, InMemoryEventLog};
pub use publisher::{AdmissionPublisher, PublicationSummary};
pub use repository::{
    AdmissionDirectory, AdmissionEvent, ApplicationStore, EventError, EventPublisher,
    RepositoryError,
};
pub use router::admission_router;
pub use service::{AdmissionError, AdmissionService, Missing};
pub use waitlist::{next_in_line, WaitlistPromoter};
