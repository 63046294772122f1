use crate::prelude::DB;
use std::sync::Weak;
use tempfile::TempDir;

#[derive(Default)]
pub struct DbLifetime {
    weak_db_ref: Weak<DB>,
    optional_tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: Weak<DB>) -> Self {
        Self { optional_tempdir: Some(tempdir), weak_db_ref }
    }

    /// Tracks the DB reference and makes sure all strong refs are cleaned up
    /// but does not remove the DB from disk when dropped.
    pub fn without_destroy(weak_db_ref: Weak<DB>) -> Self {
        Self { optional_tempdir: None, weak_db_ref }
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for _ in 0..16 {
            if self.weak_db_ref.strong_count() > 0 {
                // Sometimes another thread is shutting down and still cleaning resources
                std::thread::sleep(std::time::Duration::from_millis(500));
            } else {
                break;
            }
        }
        assert_eq!(self.weak_db_ref.strong_count(), 0, "DB is expected to have no strong references when lifetime is dropped");
        if let Some(dir) = self.optional_tempdir.take() {
            let options = rocksdb::Options::default();
            let path_buf = dir.path().to_owned();
            let path = path_buf.to_str().unwrap();
            <rocksdb::DBWithThreadMode<rocksdb::MultiThreaded>>::destroy(&options, path)
                .expect("DB is expected to be deletable since there are no references to it");
        }
    }
}

pub fn get_kyanite_tempdir() -> TempDir {
    let global_tempdir = std::env::temp_dir();
    let kyanite_tempdir = global_tempdir.join("kyanite");
    std::fs::create_dir_all(&kyanite_tempdir).expect("expecting the global tempdir to be writable");
    tempfile::tempdir_in(&kyanite_tempdir).expect("expecting the kyanite tempdir to be writable")
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/kyanite`.
/// Callers must keep the `DbLifetime` guard for as long as they wish the DB to exist.
#[macro_export]
macro_rules! create_temp_db {
    ($conn_builder: expr) => {{
        let db_tempdir = $crate::utils::get_kyanite_tempdir();
        let db_path = db_tempdir.path().to_owned();
        let db = $conn_builder.with_db_path(db_path).build().unwrap();
        ($crate::utils::DbLifetime::new(db_tempdir, std::sync::Arc::downgrade(&db)), db)
    }};
}
