//! The data model shared by everything that reacts to a push: revisions,
//! reference changes, commits, tags and push options.
//!
//! Nothing in this crate talks to a repository; values are built once at the
//! ingestion boundary and are read-only afterwards.

mod change;
pub use change::{parse_changes, ReferenceChange};

mod commit;
pub use commit::{Commit, PathChange, PathOperation};

mod error;
pub use error::Error;

mod identity;
pub use identity::Identity;

mod options;
pub use options::PushOptions;

mod push;
pub use push::{Actor, ActorId, Project, ProjectId, Push, PushContext, DEFAULT_CI_CONFIG_PATH};

mod reference;
pub use reference::{parse_ref, Action, RefType, BRANCH_REF_PREFIX, TAG_REF_PREFIX};

mod revision;
pub use revision::{is_blank, Revision, BLANK_SHA};

mod tag;
pub use tag::Tag;
