//! The logged-in session, persisted to disk and observable.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rocket::tokio::sync::{broadcast, watch};

use crate::dashboard::client::ClientError;
use crate::model::api::{auth::Session, user::UserProfile};

const EVENT_CAPACITY: usize = 16;

/// Something changed that views showing the session should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    ProfileUpdated,
    /// An official acted, so activity feeds are stale.
    OfficialActionsUpdated,
}

pub struct SessionStore {
    path: PathBuf,
    current: watch::Sender<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Open the store at `path`, restoring a saved session if there is one.
    /// A missing or unreadable file means nobody is logged in.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match load(&path) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring saved session at {}: {e}", path.display());
                None
            }
        };
        if let Some(session) = &session {
            debug!("Restored session for {}", session.user.email);
        }
        let (current, _) = watch::channel(session);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path,
            current,
            events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// Watch the current session.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    /// Receive session events from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    pub fn log_in(&self, session: Session) -> Result<(), ClientError> {
        save(&self.path, &session)?;
        info!("Logged in as {}", session.user.email);
        self.current.send_replace(Some(session));
        self.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    pub fn log_out(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.current.send_replace(None);
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Replace the stored profile, keeping the token. Does nothing when
    /// logged out.
    pub fn update_profile(&self, user: UserProfile) -> Result<(), ClientError> {
        let Some(mut session) = self.session() else {
            warn!("Profile update ignored: not logged in");
            return Ok(());
        };
        session.user = user;
        save(&self.path, &session)?;
        self.current.send_replace(Some(session));
        self.emit(SessionEvent::ProfileUpdated);
        Ok(())
    }

    pub fn official_actions_updated(&self) {
        self.emit(SessionEvent::OfficialActionsUpdated);
    }
}

fn load(path: &Path) -> Result<Option<Session>, ClientError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save(path: &Path, session: &Session) -> Result<(), ClientError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(session)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::model::{db::user::User, db::user::UserCore, mongodb::Id};

    use super::*;

    fn session() -> Session {
        let user = User {
            id: Id::new(),
            user: UserCore::citizen_example(),
        };
        Session {
            user: user.into(),
            token: "header.claims.signature".to_string(),
        }
    }

    #[test]
    fn sessions_survive_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("civix").join("session.json");

        let store = SessionStore::open(&path);
        assert_eq!(store.session(), None);
        store.log_in(session()).unwrap();

        let saved: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved["token"], "header.claims.signature");
        assert_eq!(saved["user"]["role"], "citizen");

        let reopened = SessionStore::open(&path);
        assert_eq!(reopened.session(), store.session());
        assert_eq!(reopened.token().as_deref(), Some("header.claims.signature"));

        reopened.log_out().unwrap();
        assert!(!path.exists());
        assert_eq!(SessionStore::open(&path).session(), None);
    }

    #[test]
    fn corrupt_files_mean_logged_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SessionStore::open(&path).session(), None);
    }

    #[test]
    fn subscribers_hear_about_changes() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("session.json"));
        let mut events = store.events();
        let watcher = store.subscribe();

        store.log_in(session()).unwrap();
        let mut user = store.user().unwrap();
        user.name = "Ada Lovelace".to_string();
        store.update_profile(user).unwrap();
        store.official_actions_updated();
        store.log_out().unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                SessionEvent::LoggedIn,
                SessionEvent::ProfileUpdated,
                SessionEvent::OfficialActionsUpdated,
                SessionEvent::LoggedOut,
            ]
        );
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow(), None);
    }

    #[test]
    fn profile_updates_keep_the_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::open(&path);
        store.log_in(session()).unwrap();

        let mut user = store.user().unwrap();
        user.location = "Shelbyville".to_string();
        store.update_profile(user).unwrap();

        let reopened = SessionStore::open(&path).session().unwrap();
        assert_eq!(reopened.user.location, "Shelbyville");
        assert_eq!(reopened.token, "header.claims.signature");
    }
}
