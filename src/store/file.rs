//! Simple file-backed [`RelayStore`] for single-instance deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{BearerToken, RetryKey},
	store::{Collections, RelayStore, StoreError, StoreFuture},
};

/// Persists every collection to a JSON file after each append.
///
/// An append becomes visible to readers only once its snapshot has replaced the file.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Collections>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing JSON file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Collections, StoreError> {
		if !path.exists() {
			return Ok(Collections::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Collections::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Collections) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl RelayStore for FileStore {
	fn append_token<'a>(&'a self, collection: &'a str, token: BearerToken) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.push_token(collection, token);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}

	fn token_issued_after<'a>(
		&'a self,
		collection: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<BearerToken>> {
		Box::pin(async move { Ok(self.inner.read().token_after(collection, cutoff)) })
	}

	fn append_retry_key<'a>(&'a self, collection: &'a str, key: RetryKey) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.push_retry_key(collection, key);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}

	fn retry_key_created_after<'a>(
		&'a self,
		collection: &'a str,
		id: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<RetryKey>> {
		Box::pin(async move { Ok(self.inner.read().retry_key_after(collection, id, cutoff)) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"notify_relay_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn appends_survive_reopen() {
		let path = temp_path("reopen");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let now = OffsetDateTime::now_utc();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.append_token("AccessToken", BearerToken::new("persisted", now)))
			.expect("Failed to append fixture token to file store.");
		rt.block_on(store.append_retry_key("RetryKey", RetryKey::new("abc", now)))
			.expect("Failed to append fixture retry key to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let cutoff = now - Duration::hours(1);
		let token = rt
			.block_on(reopened.token_issued_after("AccessToken", cutoff))
			.expect("Failed to query reopened file store.")
			.expect("File store lost token after reopen.");
		let key = rt
			.block_on(reopened.retry_key_created_after("RetryKey", "abc", cutoff))
			.expect("Failed to query reopened file store.")
			.expect("File store lost retry key after reopen.");

		assert_eq!(token.value.expose(), "persisted");
		assert_eq!(key.id, "abc");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_file_opens_as_empty_store() {
		let path = temp_path("empty");

		File::create(&path).expect("Failed to create empty snapshot file.");

		let store = FileStore::open(&path).expect("Empty snapshot should open.");

		assert_eq!(store.path(), path.as_path());
		assert!(store.inner.read().tokens.is_empty());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_reports_serialization_error() {
		let path = temp_path("corrupt");

		fs::write(&path, b"{not json").expect("Failed to write corrupt snapshot.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshot must not open.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_persist_leaves_append_invisible() {
		let dir = temp_path("vanished").with_extension("d");
		let path = dir.join("store.json");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let now = OffsetDateTime::now_utc();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		fs::remove_dir_all(&dir).expect("Failed to remove the store directory.");

		let token_err = rt
			.block_on(store.append_token("AccessToken", BearerToken::new("lost", now)))
			.expect_err("Append must fail once the directory is gone.");
		let key_err = rt
			.block_on(store.append_retry_key("RetryKey", RetryKey::new("lost", now)))
			.expect_err("Append must fail once the directory is gone.");
		let cutoff = now - Duration::hours(1);

		assert!(matches!(token_err, StoreError::Backend { .. }));
		assert!(matches!(key_err, StoreError::Backend { .. }));
		assert!(
			rt.block_on(store.token_issued_after("AccessToken", cutoff))
				.expect("Query should succeed.")
				.is_none()
		);
		assert!(
			rt.block_on(store.retry_key_created_after("RetryKey", "lost", cutoff))
				.expect("Query should succeed.")
				.is_none()
		);
	}
}
