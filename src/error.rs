//! The closed set of error kinds the core and its collaborators can raise.
//!
//! Every kind named in the specification's error-handling design shows up
//! here as one `SdlError` variant. `is_fatal` implements the propagation
//! policy in one place: soft errors are reported and parsing continues,
//! fatal ones abort the run.

use std::fmt;

/// Start/end source position of whatever triggered an error or was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
}

impl Location {
    pub fn at(line: u32, column: u32) -> Self {
        Location {
            first_line: line,
            first_column: column,
            last_line: line,
            last_column: column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first_line == self.last_line {
            write!(f, "line {}", self.first_line)
        } else {
            write!(f, "lines {}-{}", self.first_line, self.last_line)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SdlError {
    #[error("{0}: syntax error: {1}")]
    SyntaxErr(Location, String),

    #[error("{0}: END name \"{1}\" does not match the open aggregate \"{2}\"")]
    MatchEnd(Location, String, String),

    #[error("{0}: aggregate \"{1}\" has no members")]
    NullStruct(Location, String),

    #[error("{0}: aggregate member has no name")]
    InvAggrNam(Location),

    #[error("{0}: invalid conditional-state transition")]
    InvCondSt(Location),

    #[error("{0}: symbol \"{1}\" is not defined")]
    SymNotDef(Location, String),

    #[error("{0}: address/pointer target \"{1}\" is not a BASED aggregate")]
    AdrObjBas(Location, String),

    #[error("{0}: CHARACTER * is not permitted here")]
    InvUnkLen(Location),

    #[error("{0}: bit-field \"{1}\" has non-positive length")]
    ZeroLen(Location, String),

    #[error("{0}: language \"{1}\" was already specified")]
    DupLang(Location, String),

    #[error("{0}: qualifier \"{1}\" was already specified for this declaration")]
    DupListQual(Location, String),

    #[error("{0}: qualifier \"{1}\" is not valid here")]
    InvQual(Location, String),

    #[error("{0}: \"{1}\" is not a valid alignment value")]
    InvAlign(Location, String),

    #[error("{0}: symbol \"{1}\" is already defined")]
    SymAlrDef(Location, String),

    #[error("cannot open input file \"{0}\": {1}")]
    InFilOpn(String, std::io::Error),

    #[error("cannot open output file \"{0}\": {1}")]
    OutFilOpn(String, std::io::Error),

    #[error("cannot open copyright prelude file \"{0}\": {1}")]
    NoCopyFil(String, std::io::Error),

    #[error("no output language was selected")]
    NoOutput,

    #[error("no input file was given")]
    NoInpFil,

    #[error("{0}: \"{1}\" redefines an existing ITEM")]
    Abort(Location, String),

    #[error("out of memory")]
    Enomem,

    #[error("an internal error prevented formatting a prior message")]
    ErrExit,
}

impl SdlError {
    /// Soft errors are reported (to the message vector / listing) and
    /// processing of the current MODULE continues with the next
    /// declaration. Fatal errors abort the whole translation run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SdlError::InFilOpn(..)
                | SdlError::OutFilOpn(..)
                | SdlError::NoCopyFil(..)
                | SdlError::NoOutput
                | SdlError::NoInpFil
                | SdlError::Enomem
                | SdlError::ErrExit
        )
    }

    /// The short mnemonic spec.md uses to name this error kind, as it would
    /// appear in the listing next to the offending source line.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            SdlError::SyntaxErr(..) => "SYNTAXERR",
            SdlError::MatchEnd(..) => "MATCHEND",
            SdlError::NullStruct(..) => "NULLSTRUCT",
            SdlError::InvAggrNam(..) => "INVAGGRNAM",
            SdlError::InvCondSt(..) => "INVCONDST",
            SdlError::SymNotDef(..) => "SYMNOTDEF",
            SdlError::AdrObjBas(..) => "ADROBJBAS",
            SdlError::InvUnkLen(..) => "INVUNKLEN",
            SdlError::ZeroLen(..) => "ZEROLEN",
            SdlError::DupLang(..) => "DUPLANG",
            SdlError::DupListQual(..) => "DUPLISTQUAL",
            SdlError::InvQual(..) => "INVQUAL",
            SdlError::InvAlign(..) => "INVALIGN",
            SdlError::SymAlrDef(..) => "SYMALRDEF",
            SdlError::InFilOpn(..) => "INFILOPN",
            SdlError::OutFilOpn(..) => "OUTFILOPN",
            SdlError::NoCopyFil(..) => "NOCOPYFIL",
            SdlError::NoOutput => "NOOUTPUT",
            SdlError::NoInpFil => "NOINPFIL",
            SdlError::Abort(..) => "ABORT",
            SdlError::Enomem => "ENOMEM",
            SdlError::ErrExit => "ERREXIT",
        }
    }
}

/// The success side of a builder call: `NORMAL`/`CREATED`/`NOTCREATED`
/// from spec.md's Control error group are not errors at all, so they live
/// on the `Ok` side of `Result<Status, SdlError>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Normal,
    Created,
    NotCreated,
}

pub type SdlResult<T> = Result<T, SdlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification_matches_policy() {
        assert!(SdlError::NoInpFil.is_fatal());
        assert!(SdlError::Enomem.is_fatal());
        assert!(!SdlError::InvCondSt(Location::default()).is_fatal());
        assert!(!SdlError::ZeroLen(Location::default(), "X".into()).is_fatal());
    }

    #[test]
    fn location_display_single_vs_range() {
        let single = Location::at(5, 1);
        assert_eq!(single.to_string(), "line 5");
        let range = Location {
            first_line: 5,
            first_column: 1,
            last_line: 7,
            last_column: 3,
        };
        assert_eq!(range.to_string(), "lines 5-7");
    }
}
