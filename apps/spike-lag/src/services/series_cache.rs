//! Cached per-song series on disk.
//!
//! Each platform has its own directory of CSV files. A file holds the track
//! title on its first line, `timestamp_ms,value` rows, and then the artist
//! name and avatar URL on the last two lines.

use crate::error::{Result, SpikeLagError};
use crate::series::{Platform, Series, SongSeries, SongSeriesPart, TimePoint, TrackMeta};
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where raw series come from. Network retrieval lives behind this seam.
pub trait SeriesSource: Send + Sync {
    /// `Ok(None)` when the source simply has nothing for this song/platform.
    fn load(&self, song_id: &str, platform: Platform) -> Result<Option<SongSeriesPart>>;
}

#[derive(Debug, Clone)]
pub struct CsvCacheSource {
    root: PathBuf,
}

impl CsvCacheSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, song_id: &str, platform: Platform) -> PathBuf {
        match platform {
            Platform::A => self
                .root
                .join("spotify_reach_dataset")
                .join(format!("spotify_reach_series_{song_id}.csv")),
            Platform::B => self
                .root
                .join("tiktok_series_dataset")
                .join(format!("tiktok_series_{song_id}.csv")),
        }
    }

    /// Write `part` in the cache layout, creating the platform directory.
    pub fn store(&self, song_id: &str, platform: Platform, part: &SongSeriesPart) -> Result<PathBuf> {
        let path = self.path_for(song_id, platform);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SpikeLagError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let csv_err = |source| SpikeLagError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(csv_err)?;
        writer.write_record([part.meta.title.as_str()]).map_err(csv_err)?;
        for point in part.series.points() {
            writer
                .write_record([point.timestamp_ms.to_string(), point.value.to_string()])
                .map_err(csv_err)?;
        }
        writer
            .write_record([part.meta.artist.as_deref().unwrap_or_default()])
            .map_err(csv_err)?;
        writer
            .write_record([part.meta.avatar_url.as_deref().unwrap_or_default()])
            .map_err(csv_err)?;
        writer.flush().map_err(|source| SpikeLagError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl SeriesSource for CsvCacheSource {
    fn load(&self, song_id: &str, platform: Platform) -> Result<Option<SongSeriesPart>> {
        let path = self.path_for(song_id, platform);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SpikeLagError::Io { path, source }),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| SpikeLagError::Csv {
                path: path.clone(),
                source,
            })?;
            records.push(record);
        }
        parse_cache_records(&records)
            .map(Some)
            .map_err(|err| match err {
                SpikeLagError::InvalidSeries(msg) => {
                    SpikeLagError::InvalidSeries(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }
}

fn joined(record: &csv::StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(",").trim().to_string()
}

fn parse_point(record: &csv::StringRecord) -> Option<TimePoint> {
    if record.len() != 2 {
        return None;
    }
    let timestamp_ms = record.get(0)?.parse::<i64>().ok()?;
    let value = record.get(1)?.parse::<f64>().ok()?;
    Some(TimePoint::new(timestamp_ms, value))
}

fn parse_cache_records(records: &[csv::StringRecord]) -> Result<SongSeriesPart> {
    let Some((title, rest)) = records.split_first() else {
        return Err(SpikeLagError::InvalidSeries("cache file is empty".to_string()));
    };

    let mut points = Vec::with_capacity(rest.len());
    let mut trailing: Vec<String> = Vec::new();
    for (idx, record) in rest.iter().enumerate() {
        match parse_point(record) {
            Some(point) if trailing.is_empty() => points.push(point),
            Some(_) => {
                return Err(SpikeLagError::InvalidSeries(format!(
                    "data row {} follows a metadata row",
                    idx + 2
                )))
            }
            None => trailing.push(joined(record)),
        }
    }
    if trailing.len() > 2 {
        return Err(SpikeLagError::InvalidSeries(format!(
            "expected at most 2 trailing metadata rows, found {}",
            trailing.len()
        )));
    }

    let meta_at = |idx: usize| trailing.get(idx).filter(|v| !v.is_empty()).cloned();
    Ok(SongSeriesPart {
        meta: TrackMeta {
            title: joined(title),
            artist: meta_at(0),
            avatar_url: meta_at(1),
        },
        series: Series::new(points)?,
    })
}

/// In-memory source, handy for tests and for callers that already hold data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    parts: HashMap<(String, Platform), SongSeriesPart>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, song_id: &str, platform: Platform, part: SongSeriesPart) {
        self.parts.insert((song_id.to_string(), platform), part);
    }
}

impl SeriesSource for MemorySource {
    fn load(&self, song_id: &str, platform: Platform) -> Result<Option<SongSeriesPart>> {
        Ok(self.parts.get(&(song_id.to_string(), platform)).cloned())
    }
}

/// Both platforms for one song, or `MissingSeries` naming the absent one.
pub fn load_song(source: &dyn SeriesSource, song_id: &str) -> Result<SongSeries> {
    let fetch = |platform: Platform| -> Result<SongSeriesPart> {
        source
            .load(song_id, platform)?
            .ok_or_else(|| SpikeLagError::MissingSeries {
                song_id: song_id.to_string(),
                platform,
            })
    };
    let a = fetch(Platform::A)?;
    let b = fetch(Platform::B)?;

    let meta = if a.meta.title.is_empty() {
        b.meta
    } else {
        a.meta
    };
    Ok(SongSeries {
        song_id: song_id.to_string(),
        meta,
        a: a.series,
        b: b.series,
    })
}

/// One song id per line; blank lines and `#` comments are skipped.
pub fn read_song_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| SpikeLagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
