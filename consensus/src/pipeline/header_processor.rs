use crate::{
    consensus::{services::ConsensusServices, storage::ConsensusStorage},
    model::{
        services::reachability::ReachabilityService,
        stores::{
            daa::{DaaStore, DaaStoreReader},
            depth::DepthStore,
            ghostdag::{GhostdagData, GhostdagStoreReader},
            headers_selected_tip::{HeadersSelectedTipStore, HeadersSelectedTipStoreReader},
            pruning::PruningStoreReader,
            reachability::StagingReachabilityStore,
            relations::RelationsStoreReader,
            statuses::{StatusesStore, StatusesStoreBatchExtensions, StatusesStoreReader},
            DB,
        },
    },
    processes::{ghostdag::ordering::SortableBlock, reachability::inquirer as reachability, traversal_manager::BlockWindowHeap},
};
use kyanite_consensus_core::{
    blockhash::BlockHashExtensions,
    blockstatus::BlockStatus::{self, StatusHeaderOnly, StatusInvalid},
    config::params::Params,
    constants::BLOCK_VERSION,
    errors::block::{BlockProcessResult, RuleError},
    header::Header,
    BlockHashSet,
};
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;
use kyanite_math::Uint256;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Accumulates the staged header data while it flows through validation,
/// so the commit at the end writes everything in a single atomic batch
pub struct HeaderProcessingContext {
    pub hash: Hash,
    pub header: Arc<Header>,
    pub pruning_point: Hash,

    // Staging data
    pub ghostdag_data: Option<Arc<GhostdagData>>,
    pub block_window_for_difficulty: Option<BlockWindowHeap>,
    pub block_window_for_past_median_time: Option<BlockWindowHeap>,
    pub daa_score: Option<u64>,
    pub mergeset_non_daa: Option<BlockHashSet>,
    pub merge_depth_root: Option<Hash>,
    pub finality_point: Option<Hash>,
}

impl HeaderProcessingContext {
    pub fn new(hash: Hash, header: Arc<Header>, pruning_point: Hash) -> Self {
        Self {
            hash,
            header,
            pruning_point,
            ghostdag_data: None,
            block_window_for_difficulty: None,
            block_window_for_past_median_time: None,
            daa_score: None,
            mergeset_non_daa: None,
            merge_depth_root: None,
            finality_point: None,
        }
    }

    /// Returns the GHOSTDAG data of this header.
    /// NOTE: expected to be called only after GHOSTDAG computation was pushed into the context
    pub fn ghostdag_data(&self) -> &Arc<GhostdagData> {
        self.ghostdag_data.as_ref().expect("expected to be set by now")
    }
}

pub struct HeaderProcessor {
    // Config
    genesis_hash: Hash,
    max_block_parents: u8,
    mergeset_size_limit: u64,
    skip_proof_of_work: bool,
    max_future_block_time: u64,
    max_difficulty_target: Uint256,
    difficulty_window_size: usize,
    past_median_time_window_size: usize,

    // DB
    db: Arc<DB>,

    // Stores and services
    storage: Arc<ConsensusStorage>,
    services: Arc<ConsensusServices>,
}

impl HeaderProcessor {
    pub fn new(params: &Params, db: Arc<DB>, storage: Arc<ConsensusStorage>, services: Arc<ConsensusServices>) -> Self {
        Self {
            genesis_hash: params.genesis_hash(),
            max_block_parents: params.max_block_parents,
            mergeset_size_limit: params.mergeset_size_limit,
            skip_proof_of_work: params.skip_proof_of_work,
            max_future_block_time: params.max_future_block_time,
            max_difficulty_target: params.max_difficulty_target,
            difficulty_window_size: params.difficulty_window_size,
            past_median_time_window_size: params.past_median_time_window_size(),
            db,
            storage,
            services,
        }
    }

    /// Runs the full header validation pipeline for a new header and commits
    /// it with status `StatusHeaderOnly`
    pub fn process_header(&self, header: Arc<Header>) -> BlockProcessResult<BlockStatus> {
        match self.storage.statuses_store.read().get(header.hash).unwrap_option() {
            Some(StatusInvalid) => return Err(RuleError::KnownInvalid),
            Some(status) => return Ok(status),
            None => {}
        }

        self.validate_header_in_isolation(&header)?;
        self.validate_parent_relations(&header)?;

        let mut ctx = HeaderProcessingContext::new(
            header.hash,
            header.clone(),
            self.storage.pruning_store.read().pruning_point().unwrap(),
        );
        self.ghostdag(&mut ctx);

        if let Err(e) = self.validate_header_in_context(&mut ctx) {
            // A contextually-invalid header is still recorded as invalid
            // (its parents are known, so the failure is its own)
            self.storage.statuses_store.write().set(ctx.hash, StatusInvalid).unwrap();
            return Err(e);
        }

        self.commit_header(ctx);
        Ok(StatusHeaderOnly)
    }

    /// Isolation checks: everything that can be validated given the header
    /// alone (spec: parents count/order, version, target range, PoW)
    fn validate_header_in_isolation(&self, header: &Header) -> BlockProcessResult<()> {
        if header.version != BLOCK_VERSION {
            return Err(RuleError::WrongBlockVersion(header.version));
        }

        if header.parents.is_empty() {
            return Err(RuleError::NoParents);
        }

        if header.parents.len() > self.max_block_parents as usize {
            return Err(RuleError::TooManyParents(header.parents.len(), self.max_block_parents as usize));
        }

        // Parent hashes must be strictly ascending, which also rules out repetition
        for pair in header.parents.windows(2) {
            if pair[0] == pair[1] {
                return Err(RuleError::DuplicateParent(pair[0]));
            }
            if pair[0] > pair[1] {
                return Err(RuleError::ParentsNotSorted);
            }
        }

        if header.parents.iter().any(|parent| parent.is_origin() || parent.is_none() || parent.is_virtual()) {
            return Err(RuleError::InvalidParent(*header.parents.first().expect("parents are non-empty")));
        }

        if !kyanite_pow::is_target_in_range(header.bits, self.max_difficulty_target) {
            return Err(RuleError::TargetOutOfRange(header.bits));
        }

        if !self.skip_proof_of_work {
            let (passed, _) = kyanite_pow::check_pow(header);
            if !passed {
                return Err(RuleError::InvalidPoW);
            }
        }

        Ok(())
    }

    /// Verifies all parents are known valid headers, otherwise reports which
    /// are missing or invalid
    fn validate_parent_relations(&self, header: &Header) -> BlockProcessResult<()> {
        let statuses_read = self.storage.statuses_store.read();
        let mut missing = Vec::new();
        for parent in header.parents.iter().copied() {
            match statuses_read.get(parent).unwrap_option() {
                None => missing.push(parent),
                Some(StatusInvalid) => return Err(RuleError::InvalidParent(parent)),
                Some(_) => {}
            }
        }
        if !missing.is_empty() {
            return Err(RuleError::MissingParents(missing));
        }
        Ok(())
    }

    /// Runs the GHOSTDAG algorithm and writes the data into the context (if not already computed before)
    fn ghostdag(&self, ctx: &mut HeaderProcessingContext) {
        let ghostdag_data = self
            .storage
            .ghostdag_store
            .get_data(ctx.hash)
            .unwrap_option()
            .unwrap_or_else(|| Arc::new(self.services.ghostdag_manager.ghostdag(&ctx.header.parents, Some(ctx.header.bits))));
        ctx.ghostdag_data = Some(ghostdag_data);
    }

    /// Context checks: incest, merge-set size, past median time, difficulty
    /// bits, bounded merge depth, DAA score and depth anchors
    fn validate_header_in_context(&self, ctx: &mut HeaderProcessingContext) -> BlockProcessResult<()> {
        self.check_parents_incest(ctx)?;
        self.check_mergeset_size_limit(ctx)?;
        self.check_median_time(ctx)?;
        self.check_difficulty_and_daa_score(ctx)?;
        self.check_bounded_merge_depth(ctx)?;
        Ok(())
    }

    /// No parent may be the ancestor of another parent
    fn check_parents_incest(&self, ctx: &HeaderProcessingContext) -> BlockProcessResult<()> {
        let parents = &ctx.header.parents;
        for parent_a in parents.iter().copied() {
            for parent_b in parents.iter().copied() {
                if parent_a == parent_b {
                    continue;
                }
                if self.services.reachability_service.is_dag_ancestor_of(parent_a, parent_b) {
                    return Err(RuleError::InvalidParentsRelation(parent_a, parent_b));
                }
            }
        }
        Ok(())
    }

    fn check_mergeset_size_limit(&self, ctx: &HeaderProcessingContext) -> BlockProcessResult<()> {
        // The spec-level merge set excludes the selected parent
        let mergeset_size = (ctx.ghostdag_data().mergeset_size() - 1) as u64;
        if mergeset_size > self.mergeset_size_limit {
            return Err(RuleError::MergeSetTooBig(mergeset_size, self.mergeset_size_limit));
        }
        Ok(())
    }

    fn check_median_time(&self, ctx: &mut HeaderProcessingContext) -> BlockProcessResult<()> {
        let window = self.services.dag_traversal_manager.block_window(ctx.ghostdag_data(), self.past_median_time_window_size);
        let past_median_time = self.services.past_median_time_manager.calc_past_median_time(ctx.ghostdag_data(), &window);
        ctx.block_window_for_past_median_time = Some(window);

        if ctx.header.timestamp <= past_median_time {
            return Err(RuleError::TimeTooOld(ctx.header.timestamp, past_median_time));
        }

        // Guard against far-future timestamps relative to the local clock
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_millis() as u64;
        let max_allowed = now + self.max_future_block_time;
        if ctx.header.timestamp > max_allowed {
            return Err(RuleError::TimeTooFarIntoTheFuture(ctx.header.timestamp, max_allowed));
        }

        Ok(())
    }

    fn check_difficulty_and_daa_score(&self, ctx: &mut HeaderProcessingContext) -> BlockProcessResult<()> {
        let window = self.services.dag_traversal_manager.block_window(ctx.ghostdag_data(), self.difficulty_window_size);
        let expected_bits = self.services.difficulty_manager.calculate_difficulty_bits(&window);

        if ctx.header.bits != expected_bits {
            return Err(RuleError::UnexpectedDifficulty(ctx.hash, ctx.header.bits, expected_bits));
        }

        let selected_parent_daa_score = if ctx.ghostdag_data().selected_parent.is_origin() {
            0
        } else {
            self.storage.daa_store.get_daa_score(ctx.ghostdag_data().selected_parent).unwrap()
        };
        let (daa_score, mergeset_non_daa) = self.services.difficulty_manager.calc_daa_score_and_mergeset_non_daa_blocks(
            ctx.ghostdag_data(),
            self.storage.ghostdag_store.as_ref(),
            selected_parent_daa_score,
        );

        ctx.block_window_for_difficulty = Some(window);
        ctx.daa_score = Some(daa_score);
        ctx.mergeset_non_daa = Some(mergeset_non_daa);
        Ok(())
    }

    /// The anti-finality-violation merge rule: merging a block which is not
    /// in the future of the merge depth root is allowed only if some blue of
    /// the new block kosherizes it
    fn check_bounded_merge_depth(&self, ctx: &mut HeaderProcessingContext) -> BlockProcessResult<()> {
        let ghostdag_data = ctx.ghostdag_data().clone();
        let merge_depth_root = self.services.depth_manager.calc_merge_depth_root(&ghostdag_data, ctx.pruning_point);
        let finality_point = self.services.depth_manager.calc_finality_point(&ghostdag_data, ctx.pruning_point);
        let mut kosherizing_blues: Option<Vec<Hash>> = None;

        for red in ghostdag_data.mergeset_reds.iter().copied() {
            if self.services.reachability_service.is_dag_ancestor_of(merge_depth_root, red) {
                continue;
            }
            // Lazy load the kosherizing blocks since this case is rare
            if kosherizing_blues.is_none() {
                kosherizing_blues = Some(self.services.depth_manager.kosherizing_blues(&ghostdag_data, merge_depth_root).collect());
            }
            if !self
                .services
                .reachability_service
                .is_dag_ancestor_of_any(red, &mut kosherizing_blues.as_ref().unwrap().iter().copied())
            {
                return Err(RuleError::ViolatingBoundedMergeDepth);
            }
        }

        ctx.merge_depth_root = Some(merge_depth_root);
        ctx.finality_point = Some(finality_point);
        Ok(())
    }

    /// Commits all staged header data in a single atomic batch
    fn commit_header(&self, ctx: HeaderProcessingContext) {
        let ghostdag_data = ctx.ghostdag_data().clone();

        // Create a DB batch writer
        let mut batch = WriteBatch::default();

        // Append-only stores: these require no lock and hence are written first
        self.storage.ghostdag_store.insert_batch(&mut batch, ctx.hash, &ghostdag_data).unwrap();
        self.storage
            .daa_store
            .insert_batch(&mut batch, ctx.hash, ctx.daa_score.unwrap(), Arc::new(ctx.mergeset_non_daa.unwrap()))
            .unwrap();
        self.storage.headers_store.insert_batch(&mut batch, ctx.hash, ctx.header.clone()).unwrap();
        self.storage
            .depth_store
            .insert_batch(&mut batch, ctx.hash, ctx.merge_depth_root.unwrap(), ctx.finality_point.unwrap())
            .unwrap();

        // Create a staging reachability store. The reachability store is
        // only locked for write during the brief batch write below.
        let mut staging = StagingReachabilityStore::new(self.storage.reachability_store.upgradable_read());
        let selected_parent = ghostdag_data.selected_parent;
        let mut reachability_mergeset = ghostdag_data.unordered_mergeset_without_selected_parent();
        reachability::add_block(&mut staging, ctx.hash, selected_parent, &mut reachability_mergeset).unwrap();

        // Non-append-only stores need to hold their write locks until the batch is written
        let mut hst_write = self.storage.headers_selected_tip_store.write();
        let prev_hst = hst_write.get().unwrap();
        let new_candidate = SortableBlock::new(ctx.hash, ghostdag_data.blue_work);
        if new_candidate > prev_hst && reachability::is_chain_ancestor_of(&staging, ctx.pruning_point, ctx.hash).unwrap() {
            // Hint reachability about the new tip
            reachability::hint_virtual_selected_parent(&mut staging, ctx.hash).unwrap();
            hst_write.set_batch(&mut batch, new_candidate).unwrap();
        }

        let mut relations_write = self.storage.relations_store.write();
        relations_write.insert_batch(&mut batch, ctx.hash, Arc::new(ctx.header.parents.clone())).unwrap();

        let statuses_write = self.storage.statuses_store.set_batch(&mut batch, ctx.hash, StatusHeaderOnly).unwrap();

        // Write the reachability data. Only at this brief moment the
        // reachability store is locked for reads.
        let reachability_write = staging.commit(&mut batch).unwrap();

        // Flush the batch to the DB
        self.db.write(batch).unwrap();

        // Calling the drops explicitly after the batch is written in order to avoid possible errors.
        drop(reachability_write);
        drop(statuses_write);
        drop(relations_write);
        drop(hst_write);
    }

    /// Commits the genesis header through the regular commit path, with its
    /// fixed GHOSTDAG data over the origin sentinel
    pub fn process_genesis(&self, genesis_header: Arc<Header>) {
        // Init the origin-rooted stores
        {
            let mut relations_write = self.storage.relations_store.write();
            if !relations_write.has(kyanite_consensus_core::blockhash::ORIGIN).unwrap() {
                let mut batch = WriteBatch::default();
                relations_write.insert_batch(&mut batch, kyanite_consensus_core::blockhash::ORIGIN, Arc::new(vec![])).unwrap();
                let mut hst_write = self.storage.headers_selected_tip_store.write();
                hst_write.set_batch(&mut batch, SortableBlock::new(kyanite_consensus_core::blockhash::ORIGIN, 0u64.into())).unwrap();
                self.db.write(batch).unwrap();
                drop(hst_write);
            }
        }
        {
            let mut reachability_write = self.storage.reachability_store.write();
            reachability::init(&mut *reachability_write).unwrap();
        }

        let mut ctx = HeaderProcessingContext::new(self.genesis_hash, genesis_header, self.genesis_hash);
        ctx.ghostdag_data = Some(Arc::new(self.services.ghostdag_manager.genesis_ghostdag_data()));
        ctx.daa_score = Some(0);
        ctx.mergeset_non_daa = Some(Default::default());
        ctx.merge_depth_root = Some(self.genesis_hash);
        ctx.finality_point = Some(self.genesis_hash);
        self.commit_header(ctx);

        // The origin sentinel compares above any real hash, so the regular
        // selected-tip bump does not cover genesis; set it explicitly
        let mut batch = WriteBatch::default();
        let mut hst_write = self.storage.headers_selected_tip_store.write();
        hst_write.set_batch(&mut batch, SortableBlock::new(self.genesis_hash, 0u64.into())).unwrap();
        self.db.write(batch).unwrap();
        drop(hst_write);
    }
}
