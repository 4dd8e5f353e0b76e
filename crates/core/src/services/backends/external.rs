use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::fetch::{RawContentFetcher, SourceFetcher};
use crate::model::{LineSet, Revision, StartIndex};
use crate::project::ProjectContext;
use crate::services::backends::line_differ::run_line_differ;
use crate::services::backends::slicer::run_slicer;
use crate::services::oracle::{
    DiffLines, GroundTruthDiffer, LineMapper, LineMapping, MappingRequest, OracleError,
    SliceOracle, SliceStrategy, SourceRef,
};
use crate::vcs::{parse_numbered_diff, GitInspector};

/// Settings the external oracles need, lifted out of `PipelineConfig`.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub slicer: Vec<String>,
    pub line_differ: Vec<String>,
    pub linenum_filter: PathBuf,
    pub extension: String,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MappingCacheKey {
    repo: String,
    commit_new: String,
    file_old: String,
    file_new: String,
    reversed: bool,
}

/// 1-based result of a mapping call; re-based on every lookup.
#[derive(Debug, Clone)]
enum CachedMapping {
    Equals,
    Pairs(Vec<(u32, u32)>),
}

/// Oracle adapter that shells out to the slicer, the line differ, git and the line-number
/// filter, fetching source files through a `SourceFetcher`.
pub struct ExternalOracles {
    fetcher: Box<dyn SourceFetcher>,
    git: GitInspector,
    settings: OracleSettings,
    mapping_cache: Mutex<HashMap<MappingCacheKey, CachedMapping>>,
}

impl ExternalOracles {
    pub fn new(fetcher: Box<dyn SourceFetcher>, git: GitInspector, settings: OracleSettings) -> Self {
        Self { fetcher, git, settings, mapping_cache: Mutex::new(HashMap::new()) }
    }

    /// Wire up the real HTTP fetcher and git clones from a project context.
    pub fn from_context(ctx: &ProjectContext) -> Self {
        let oracles = &ctx.config.oracles;
        let timeout = Duration::from_secs(oracles.timeout_secs);
        let settings = OracleSettings {
            slicer: oracles.slicer.clone(),
            line_differ: oracles.line_differ.clone(),
            linenum_filter: ctx.layout.resolve(&oracles.linenum_filter),
            extension: ctx.config.source.extension.clone(),
            cache_dir: ctx.layout.cache_dir.clone(),
            timeout,
        };
        let fetcher = RawContentFetcher::new(&ctx.config.source.raw_host, timeout);
        let git = GitInspector::new(&oracles.git, &ctx.layout.repos_dir, timeout);
        Self::new(Box::new(fetcher), git, settings)
    }

    /// Fetch `source` into a temp file under the cache dir. The file is removed on drop.
    fn fetch_to_temp(&self, source: &SourceRef) -> Result<(NamedTempFile, Vec<u8>), OracleError> {
        let bytes = self.fetcher.fetch(source)?;
        std::fs::create_dir_all(&self.settings.cache_dir)?;
        let suffix = Path::new(&source.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let prefix = format!("{}_", source.commit.chars().take(12).collect::<String>());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.settings.cache_dir)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok((file, bytes))
    }

    fn compute_mapping(
        &self,
        request: &MappingRequest,
    ) -> Result<CachedMapping, OracleError> {
        let parent = self.git.parent_commit(&request.repo, &request.commit_new)?;
        let (commit_old, commit_new) = if request.reversed {
            (request.commit_new.clone(), parent)
        } else {
            (parent, request.commit_new.clone())
        };

        let old = SourceRef::new(&request.repo, commit_old, &request.file_old);
        let new = SourceRef::new(&request.repo, commit_new, &request.file_new);
        let (old_file, old_bytes) = self.fetch_to_temp(&old)?;
        let (new_file, new_bytes) = self.fetch_to_temp(&new)?;

        if old_bytes == new_bytes {
            return Ok(CachedMapping::Equals);
        }
        let pairs = run_line_differ(
            &self.settings.line_differ,
            old_file.path(),
            new_file.path(),
            self.settings.timeout,
        )?;
        Ok(CachedMapping::Pairs(pairs))
    }
}

impl SliceOracle for ExternalOracles {
    fn reduce_slice(
        &self,
        target: &SourceRef,
        lines: &LineSet,
        strategy: SliceStrategy,
        start: StartIndex,
    ) -> Result<LineSet, OracleError> {
        if lines.is_empty() {
            return Ok(LineSet::new());
        }
        let (file, _) = self.fetch_to_temp(target)?;
        let one_based: LineSet = lines.iter().map(|l| start.to_one_based(*l)).collect();
        let sliced =
            run_slicer(&self.settings.slicer, file.path(), strategy, &one_based, self.settings.timeout)?;
        Ok(sliced.into_iter().map(|l| start.from_one_based(l)).collect())
    }
}

impl LineMapper for ExternalOracles {
    fn map_lines(&self, request: &MappingRequest) -> Result<LineMapping, OracleError> {
        let key = MappingCacheKey {
            repo: request.repo.clone(),
            commit_new: request.commit_new.clone(),
            file_old: request.file_old.clone(),
            file_new: request.file_new.clone(),
            reversed: request.reversed,
        };
        let cached = self.mapping_cache.lock().ok().and_then(|cache| cache.get(&key).cloned());
        let mapping = match cached {
            Some(mapping) => mapping,
            None => {
                let mapping = self.compute_mapping(request)?;
                if let Ok(mut cache) = self.mapping_cache.lock() {
                    cache.insert(key, mapping.clone());
                }
                mapping
            }
        };
        Ok(match mapping {
            CachedMapping::Equals => LineMapping::Equals,
            CachedMapping::Pairs(pairs) => LineMapping::from_one_based_pairs(&pairs, request.start),
        })
    }
}

impl GroundTruthDiffer for ExternalOracles {
    fn diff_ground_truth(
        &self,
        repo: &str,
        commit_old: &str,
        commit_new: &str,
        revision: Revision,
    ) -> Result<DiffLines, OracleError> {
        let (from, to) = match revision {
            Revision::Vuln => (commit_new, commit_old),
            Revision::Fix => (commit_old, commit_new),
        };
        let diff = self.git.diff_with_line_numbers(repo, from, to, &self.settings.linenum_filter)?;
        Ok(parse_numbered_diff(&diff, &self.settings.extension))
    }
}
