//! SQL identifiers chosen at run time.
//!
//! Values always travel as bound parameters. Table and column names cannot, so
//! every name spliced into a statement is an [`Ident`]: validated on
//! construction and rendered double-quoted. Stage names are further restricted
//! to the configured [`Stages`] allow-list.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

const MAX_IDENT_LEN: usize = 63;

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static pattern"))
}

fn run_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("static pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn parse(name: &str) -> Result<Self> {
        if name.len() > MAX_IDENT_LEN || !ident_pattern().is_match(name) {
            return Err(Error::InvalidIdentifier(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Unquoted name, for file names and log lines.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// A stage table name taken from the configured allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageName(Ident);

impl StageName {
    pub fn table(&self) -> &Ident {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// `id_<stage>`: the column keying a stage's points or nodes.
    pub fn id_column(&self) -> Result<Ident> {
        Ident::parse(&format!("id_{}", self.as_str()))
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `costo_<source>_<target>`: the cost column of one stage transition.
pub fn cost_column(source: &StageName, target: &StageName) -> Result<Ident> {
    Ident::parse(&format!("costo_{}_{}", source.as_str(), target.as_str()))
}

/// The ordered stage list. Position defines chain order.
#[derive(Debug, Clone)]
pub struct Stages {
    names: Vec<StageName>,
}

impl Stages {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.len() < 2 {
            return Err(Error::Stages(format!(
                "at least two stages are required, got {}",
                names.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut parsed = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if !seen.insert(name.to_string()) {
                return Err(Error::Stages(format!("stage {name:?} listed twice")));
            }
            parsed.push(StageName(Ident::parse(name)?));
        }

        Ok(Self { names: parsed })
    }

    /// Looks a stage up by name; anything outside the list is rejected.
    pub fn get(&self, name: &str) -> Result<&StageName> {
        self.names
            .iter()
            .find(|stage| stage.as_str() == name)
            .ok_or_else(|| Error::UnknownStage(name.to_string()))
    }

    pub fn first(&self) -> &StageName {
        &self.names[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageName> {
        self.names.iter()
    }

    /// Consecutive (source, target) pairs in chain order.
    pub fn transitions(&self) -> impl Iterator<Item = (&StageName, &StageName)> {
        self.names.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Identifies one pipeline run; suffixes every derived artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn parse(id: &str) -> Result<Self> {
        if !run_id_pattern().is_match(id) {
            return Err(Error::InvalidIdentifier(id.to_string()));
        }

        Ok(Self(id.to_string()))
    }

    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(id[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run-scoped names of the derived tables.
#[derive(Debug, Clone)]
pub struct TableNames {
    run: RunId,
}

impl TableNames {
    pub fn new(run: RunId) -> Self {
        Self { run }
    }

    pub fn run(&self) -> &RunId {
        &self.run
    }

    pub fn node_relation(&self, stage: &StageName) -> Result<Ident> {
        Ident::parse(&format!("{}_node_{}", stage.as_str(), self.run))
    }

    pub fn cost_table(&self, source: &StageName) -> Result<Ident> {
        Ident::parse(&format!("dist_{}_{}", source.as_str(), self.run))
    }

    pub fn polygons(&self, source: &StageName) -> Result<Ident> {
        Ident::parse(&format!("poligono_{}_{}", source.as_str(), self.run))
    }

    /// Derives every table and column name a run over `stages` will touch.
    /// Fails on the first invalid name, or when two derived names (or a
    /// derived table and a stage table) coincide.
    pub fn check(&self, stages: &Stages) -> Result<()> {
        let mut tables: HashSet<Ident> = stages.iter().map(|s| s.table().clone()).collect();
        let mut columns = HashSet::new();

        for stage in stages.iter() {
            stage.id_column()?;
            claim(&mut tables, self.node_relation(stage)?)?;
        }
        for (source, target) in stages.transitions() {
            claim(&mut tables, self.cost_table(source)?)?;
            claim(&mut tables, self.polygons(source)?)?;
            claim(&mut columns, cost_column(source, target)?)?;
        }

        Ok(())
    }
}

fn claim(taken: &mut HashSet<Ident>, name: Ident) -> Result<()> {
    if taken.contains(&name) {
        return Err(Error::Stages(format!(
            "derived name {:?} would be used twice",
            name.as_str()
        )));
    }
    taken.insert(name);
    Ok(())
}
