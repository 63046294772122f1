use rocksdb::{DBWithThreadMode, MultiThreaded};
use std::cmp::min;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// The DB type used by all kyanite stores
pub struct DB {
    inner: DBWithThreadMode<MultiThreaded>,
}

impl DB {
    pub fn new(inner: DBWithThreadMode<MultiThreaded>) -> Self {
        Self { inner }
    }
}

impl DerefMut for DB {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Deref for DB {
    type Target = DBWithThreadMode<MultiThreaded>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Deletes an existing DB if it exists
pub fn delete_db(db_dir: PathBuf) {
    if !db_dir.exists() {
        return;
    }
    let options = rocksdb::Options::default();
    let path = db_dir.to_str().unwrap();
    <DBWithThreadMode<MultiThreaded>>::destroy(&options, path).expect("DB is expected to be deletable");
}

#[derive(Debug, Clone)]
pub struct ConnBuilder {
    db_path: Option<PathBuf>,
    create_if_missing: bool,
    parallelism: usize,
    files_limit: i32,
    mem_budget: usize,
}

impl Default for ConnBuilder {
    fn default() -> Self {
        ConnBuilder {
            db_path: None,
            create_if_missing: true,
            parallelism: 1,
            // In most linux environments the open-files limit is 1024, so leave sufficient slack
            files_limit: 500,
            mem_budget: 64 * 1024 * 1024,
        }
    }
}

impl ConnBuilder {
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = Some(db_path);
        self
    }

    pub fn with_create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    pub fn with_parallelism(mut self, parallelism: impl Into<usize>) -> Self {
        self.parallelism = parallelism.into();
        self
    }

    pub fn with_files_limit(mut self, files_limit: impl Into<i32>) -> Self {
        self.files_limit = files_limit.into();
        self
    }

    pub fn with_mem_budget(mut self, mem_budget: impl Into<usize>) -> Self {
        self.mem_budget = mem_budget.into();
        self
    }

    pub fn build(self) -> Result<Arc<DB>, rocksdb::Error> {
        let mut opts = rocksdb::Options::default();
        if self.parallelism > 1 {
            opts.increase_parallelism(self.parallelism as i32);
        }
        opts.optimize_level_style_compaction(self.mem_budget);
        opts.set_max_open_files(min(self.files_limit, 500));
        opts.create_if_missing(self.create_if_missing);
        let path = self.db_path.expect("a db path must be set before building");
        let inner = <DBWithThreadMode<MultiThreaded>>::open(&opts, path.to_str().unwrap())?;
        Ok(Arc::new(DB::new(inner)))
    }
}
