//! Identity-provider contract.
//!
//! Authentication itself (password, TOTP enrollment and challenge, session
//! restore) is an external collaborator. The engine needs three things from
//! it: a stable user id + email once authenticated, a phase signal that
//! distinguishes "fully authenticated" from the second-factor states, and
//! an event stream the wizard can watch to trigger migration the moment a
//! user becomes fully authenticated.

use tokio::sync::watch;
use uuid::Uuid;

/// The authenticated principal as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

/// Authentication phase reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    SignedOut,
    /// Credentials accepted, TOTP challenge outstanding.
    NeedsSecondFactor,
    /// Credentials accepted, no second factor enrolled yet.
    NeedsEnrollment,
    Authenticated(AuthenticatedUser),
}

impl AuthPhase {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            AuthPhase::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Read side of the identity collaborator.
pub trait IdentityProvider: Send + Sync {
    /// Current phase snapshot.
    fn phase(&self) -> AuthPhase;

    /// Subscribe to phase changes.
    fn subscribe(&self) -> watch::Receiver<AuthPhase>;
}

/// Watch-channel identity handle. The host side pushes phase changes from
/// its auth integration; the engine side only observes.
pub struct IdentityWatch {
    tx: watch::Sender<AuthPhase>,
}

impl IdentityWatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthPhase::SignedOut);
        IdentityWatch { tx }
    }

    /// Report a phase change (sign-in, second-factor result, sign-out).
    pub fn set_phase(&self, phase: AuthPhase) {
        // Send only fails with no receivers; the state is still stored for
        // future subscribers.
        let _ = self.tx.send(phase);
    }
}

impl Default for IdentityWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for IdentityWatch {
    fn phase(&self) -> AuthPhase {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<AuthPhase> {
        self.tx.subscribe()
    }
}

/// Wait until the identity collaborator reports full authentication.
/// Returns `None` when the auth flow is abandoned (the sender side is
/// dropped, e.g. the overlay was closed); already-saved drafts are
/// unaffected either way.
pub async fn await_authentication(
    mut rx: watch::Receiver<AuthPhase>,
) -> Option<AuthenticatedUser> {
    loop {
        if let Some(user) = rx.borrow().user() {
            return Some(user.clone());
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

/// Admin capability: the authenticated email's domain must belong to the
/// configured allowlist. Matching is case-insensitive on the domain part.
pub fn is_admin_email(email: &str, admin_domains: &[String]) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    admin_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            email: "dana@example.com".to_string(),
            full_name: Some("Dana Smith".to_string()),
        }
    }

    #[test]
    fn admin_gate_matches_domain_case_insensitively() {
        let domains = vec!["example.com".to_string(), "partners.example".to_string()];
        assert!(is_admin_email("dana@example.com", &domains));
        assert!(is_admin_email("dana@EXAMPLE.COM", &domains));
        assert!(!is_admin_email("dana@elsewhere.org", &domains));
        assert!(!is_admin_email("not-an-email", &domains));
        assert!(!is_admin_email("dana@example.com", &[]));
    }

    #[tokio::test]
    async fn await_authentication_resolves_on_full_auth() {
        let identity = IdentityWatch::new();
        let rx = identity.subscribe();
        let expected = user();

        let waiter = tokio::spawn(await_authentication(rx));
        identity.set_phase(AuthPhase::NeedsSecondFactor);
        identity.set_phase(AuthPhase::Authenticated(expected.clone()));

        let resolved = waiter.await.unwrap();
        assert_eq!(resolved, Some(expected));
    }

    #[tokio::test]
    async fn await_authentication_returns_none_when_abandoned() {
        let identity = IdentityWatch::new();
        let rx = identity.subscribe();

        let waiter = tokio::spawn(await_authentication(rx));
        identity.set_phase(AuthPhase::NeedsEnrollment);
        drop(identity);

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[test]
    fn phase_snapshot_tracks_sender() {
        let identity = IdentityWatch::new();
        assert_eq!(identity.phase(), AuthPhase::SignedOut);
        let u = user();
        identity.set_phase(AuthPhase::Authenticated(u.clone()));
        assert_eq!(identity.phase().user(), Some(&u));
    }
}
