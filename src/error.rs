//! Interpreter error kinds, one variant per three-letter mnemonic.
//!
//! Every fallible interpreter operation returns `Result<T, TecoError>`.
//! `Display` formats the full `?XXX   message` line; callers that only
//! need the mnemonic use [`TecoError::mnemonic`] rather than parsing
//! `Display` output.

#[derive(Debug, thiserror::Error)]
pub enum TecoError {
    #[error("?ARG   Improper arguments")]
    Arg,
    #[error("?BNI   \">\" not in iteration")]
    Bni,
    #[error("?MRA   \"<\" missing \">\"")]
    Mra,
    #[error("?MLA   Iteration \"<\" missing")]
    Mla,
    #[error("?FER   File error: {0}")]
    Fer(String),
    #[error("?FNF   File not found \"{0}\"")]
    Fnf(String),
    #[error("?ICE   Illegal character in search escape")]
    Ice,
    #[error("?ISA   Illegal search argument")]
    Isa,
    #[error("?ISS   Illegal search string")]
    Iss,
    #[error("?IEC   Illegal character after E")]
    Iec,
    #[error("?IFC   Illegal character after F")]
    Ifc,
    #[error("?IUC   Illegal character after ^ (uparrow)")]
    Iuc,
    #[error("?IFN   Illegal filename character")]
    Ifn,
    #[error("?IIA   Illegal insert argument")]
    Iia,
    #[error("?ILL   Illegal command character \"{0}\"")]
    Ill(String),
    #[error("?ILN   Illegal number")]
    Iln,
    #[error("?INP   Input error")]
    Inp,
    #[error("?OUT   Output error")]
    Out,
    #[error("?IPA   Negative or 0 argument to P")]
    Ipa,
    #[error("?NPA   Negative argument to P")]
    Npa,
    #[error("?IQC   Illegal quote character")]
    Iqc,
    #[error("?IQN   Illegal Q-register name \"{0}\"")]
    Iqn(String),
    #[error("?IRA   Illegal radix argument to ^R")]
    Ira,
    #[error("?MAP   Missing apostrophe")]
    Map,
    #[error("?MLP   Missing \"(\"")]
    Mlp,
    #[error("?MRP   Missing \")\"")]
    Mrp,
    #[error("?NAB   No argument before \"{0}\"")]
    Nab(String),
    #[error("?NAC   No argument before \",\"")]
    Nac,
    #[error("?NAE   No argument before \"=\"")]
    Nae,
    #[error("?NAP   No argument before \")\"")]
    Nap,
    #[error("?NAQ   No argument before \"\\\\\"")]
    Naq,
    #[error("?NAS   No argument before \";\"")]
    Nas,
    #[error("?NAU   No argument before \"U\"")]
    Nau,
    #[error("?NCA   Negative argument to \",\"")]
    Nca,
    #[error("?NFI   No file for input")]
    Nfi,
    #[error("?NFO   No file for output")]
    Nfo,
    #[error("?NYA   Numeric argument with Y")]
    Nya,
    #[error("?NYI   Not yet implemented: {0}")]
    Nyi(String),
    #[error("?OFO   Output file already open")]
    Ofo,
    #[error("?PES   Push-down list empty")]
    Pes,
    #[error("?POP   Pointer off page")]
    Pop,
    #[error("?SNI   \";\" not in iteration")]
    Sni,
    #[error("?SRH   Search failure: {0}")]
    Srh(String),
    #[error("?TAG   Missing tag \"{0}\"")]
    Tag(String),
    #[error("?UTC   Unterminated command")]
    Utc,
    #[error("?UTM   Unterminated macro")]
    Utm,
    #[error("?XAB   Execution aborted")]
    Xab,
    #[error("?YCA   Y command aborted")]
    Yca,
}

impl TecoError {
    /// The three-letter mnemonic, stable regardless of message text.
    pub fn mnemonic(&self) -> &'static str {
        use TecoError::*;
        match self {
            Arg => "ARG",
            Bni => "BNI",
            Mra => "MRA",
            Mla => "MLA",
            Fer(_) => "FER",
            Fnf(_) => "FNF",
            Ice => "ICE",
            Isa => "ISA",
            Iss => "ISS",
            Iec => "IEC",
            Ifc => "IFC",
            Iuc => "IUC",
            Ifn => "IFN",
            Iia => "IIA",
            Ill(_) => "ILL",
            Iln => "ILN",
            Inp => "INP",
            Out => "OUT",
            Ipa => "IPA",
            Npa => "NPA",
            Iqc => "IQC",
            Iqn(_) => "IQN",
            Ira => "IRA",
            Map => "MAP",
            Mlp => "MLP",
            Mrp => "MRP",
            Nab(_) => "NAB",
            Nac => "NAC",
            Nae => "NAE",
            Nap => "NAP",
            Naq => "NAQ",
            Nas => "NAS",
            Nau => "NAU",
            Nca => "NCA",
            Nfi => "NFI",
            Nfo => "NFO",
            Nya => "NYA",
            Nyi(_) => "NYI",
            Ofo => "OFO",
            Pes => "PES",
            Pop => "POP",
            Sni => "SNI",
            Srh(_) => "SRH",
            Tag(_) => "TAG",
            Utc => "UTC",
            Utm => "UTM",
            Xab => "XAB",
            Yca => "YCA",
        }
    }

    /// The fixed message body, without the leading `?XXX` code.
    pub fn message(&self) -> String {
        let full = self.to_string();
        full.splitn(2, "   ").nth(1).unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_matches_display_code() {
        let e = TecoError::Fnf("x.tec".into());
        assert_eq!(e.mnemonic(), "FNF");
        assert!(e.to_string().starts_with("?FNF"));
    }

    #[test]
    fn message_strips_code() {
        let e = TecoError::Sni;
        assert_eq!(e.message(), "\";\" not in iteration");
    }
}
