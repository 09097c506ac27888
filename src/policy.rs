// src/policy.rs
//! Who may see and remove a poll.
//!
//! Public polls and their results are world-readable. Private polls are
//! readable only by their creator. Deleting requires being the creator or
//! holding the administrator role.

use crate::error::Denial;
use crate::models::{Poll, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    ReadResults,
    Delete,
}

pub fn authorize(poll: &Poll, requester: Option<&User>, op: Operation) -> Result<(), Denial> {
    match op {
        Operation::Read | Operation::ReadResults => {
            if poll.is_public() {
                return Ok(());
            }
            let user = requester.ok_or(Denial::AuthenticationRequired)?;
            if is_creator(poll, user) {
                Ok(())
            } else {
                Err(Denial::NotPollCreator)
            }
        }
        Operation::Delete => {
            let user = requester.ok_or(Denial::AuthenticationRequired)?;
            if is_creator(poll, user) || user.is_admin() {
                Ok(())
            } else {
                Err(Denial::NotPollCreator)
            }
        }
    }
}

/// Gate for the privileged delete path, which skips the ownership check.
pub fn require_admin(requester: &User) -> Result<(), Denial> {
    if requester.is_admin() {
        Ok(())
    } else {
        Err(Denial::AdminRequired)
    }
}

pub fn can_read(poll: &Poll, requester: Option<&User>) -> bool {
    authorize(poll, requester, Operation::Read).is_ok()
}

fn is_creator(poll: &Poll, user: &User) -> bool {
    poll.created_by == user.id
}
