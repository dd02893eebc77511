use std::fmt;

/// Subconjunto de stages que un run debe ejecutar.
///
/// - `All`: todos los stages.
/// - `Stages`: sólo los nombrados; los upstream fuera de la selección se
///   consideran satisfechos por runs anteriores.
/// - `Downstream`: los nombrados más todos sus dependientes transitivos.
/// - `Stale`: los stages que la política de staleness marca para re-ejecución.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Stages(Vec<String>),
    Downstream(Vec<String>),
    Stale,
}

impl Selection {
    pub fn stages<I, S>(names: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Selection::Stages(names.into_iter().map(Into::into).collect())
    }

    pub fn downstream<I, S>(names: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Selection::Downstream(names.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("*"),
            Selection::Stages(names) => f.write_str(&names.join(",")),
            Selection::Downstream(names) => write!(f, "{}+", names.join(",")),
            Selection::Stale => f.write_str("stale"),
        }
    }
}
