//! Domain entities built on the entity model.
//!
//! | Kind | Type | Notes |
//! |------|------|-------|
//! | `user` | [`User`] | security entity |
//! | `group` | [`UserGroup`] | security entity |
//! | `membership` | [`Membership`] | group → user, updates report `MemberModify` |
//! | `content` | [`Content`] | versioned, body omitted from slim results |
//! | `content-revision` | [`ContentRevision`] | immutable |
//! | `comment` | [`Comment`] | user → content |

mod comment;
mod content;
mod group;
mod user;

pub use comment::Comment;
pub use content::{Content, ContentFields, ContentRevision};
pub use group::{MemberRole, Membership, UserGroup};
pub use user::User;
