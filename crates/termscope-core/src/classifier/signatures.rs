//! Category signature tables.
//!
//! Each category is a set of named lexical terms. A clause's confidence for a
//! category is the share of the category's terms it matches. Data collection
//! carries one extra term outside the table: a first-person data verb
//! co-occurring with a personal-data noun.
//!
//! The same module carries the finer-grained patterns the scorer reads from
//! tagged clauses: which kind of user right a clause grants, and how
//! one-sided a termination clause is.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Category;

/// A compiled category signature.
pub struct Signature {
    pub category: Category,
    pub terms: Vec<(&'static str, Regex)>,
}

impl Signature {
    fn new(category: Category, terms: &[(&'static str, &str)]) -> Self {
        Self {
            category,
            terms: terms
                .iter()
                .map(|(name, pattern)| (*name, Regex::new(pattern).unwrap()))
                .collect(),
        }
    }

    /// Number of terms a clause can match, co-occurrence terms included.
    pub fn term_count(&self) -> usize {
        match self.category {
            Category::DataCollection => self.terms.len() + 1,
            _ => self.terms.len(),
        }
    }

    /// Names of the terms matched by `text`.
    pub fn matched_terms(&self, text: &str) -> Vec<&'static str> {
        self.terms
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| *name)
            .collect()
    }
}

lazy_static! {
    // =========================================================================
    // CATEGORY SIGNATURES
    // =========================================================================

    pub static ref SIGNATURES: Vec<Signature> = vec![
        Signature::new(Category::DataCollection, &[
            ("collect_verb", r"(?i)\b(collect(s|ed|ing)?|gather(s|ed|ing)?|obtain(s|ed)?|record(s|ed)?)\b"),
            ("personal_data", PERSONAL_DATA),
            ("automatic_capture", r"(?i)\b(automatically|usage data|log (files|data)|analytics|device information)\b"),
        ]),
        Signature::new(Category::DataSharing, &[
            ("share_verb", r"(?i)\b(shar(e|es|ed|ing)|disclos(e|es|ed|ure))\b"),
            ("sell_verb", r"(?i)\b(sell(s|ing)?|sold|rent(s|ing)?)\b"),
            ("transfer_verb", r"(?i)\btransfer(s|red|ring)?\b"),
            ("recipients", r"(?i)\b(affiliates|subsidiaries|(business )?partners|law enforcement|acquirer|successor)\b"),
        ]),
        Signature::new(Category::ThirdPartySharing, &[
            ("third_party", r"(?i)\bthird[- ]part(y|ies)\b"),
            ("advertisers", r"(?i)\b(advertis(ers?|ing)|ad networks?|marketing partners)\b"),
            ("service_providers", r"(?i)\b(service providers?|vendors?|sub-?processors?)\b"),
        ]),
        Signature::new(Category::Cookies, &[
            ("cookie", r"(?i)\bcookies?\b"),
            ("trackers", r"(?i)\b(web beacons?|pixels?|tracking technolog(y|ies)|local storage|trackers?|fingerprinting)\b"),
            ("browser_controls", r"(?i)\b(browser settings|do not track)\b"),
        ]),
        Signature::new(Category::UserRights, &[
            ("right_to", r"(?i)\b(right to (access|delete|deletion|erasure|rectification|correct|object|portability|opt[- ]?out|withdraw)|your (privacy )?rights)\b"),
            ("you_may_request", r"(?i)\byou (can|may|have the right to) (request|ask|access|delete|erase|opt[- ]?out|withdraw|correct|update|download|export|object)\b"),
            ("opt_out", r"(?i)\b(opt[- ]?out|unsubscribe)\b"),
            ("request_deletion", r"(?i)\b((request|ask for) (the )?(deletion|erasure|removal)|(delete|erase) your (personal )?(data|information))\b"),
            ("portability", r"(?i)\b(data portability|portable format|machine[- ]readable)\b"),
            ("withdraw_consent", r"(?i)\bwithdraw (your )?consent\b"),
        ]),
        Signature::new(Category::Termination, &[
            ("terminate_verb", r"(?i)\b(terminat(e|es|ed|ion)|suspend(s|ed)?|suspension|discontinu(e|es|ed))\b"),
            ("account_object", r"(?i)\b(your (account|access|subscription|use of)|the services?)\b"),
            ("discretion", DISCRETION),
            ("notice_period", r"(?i)\b(notice|immediately|with immediate effect)\b"),
        ]),
        Signature::new(Category::Liability, &[
            ("liability", r"(?i)\b(liabilit(y|ies)|liable)\b"),
            ("indemnity", r"(?i)\b(indemnif(y|ication)|hold (us )?harmless)\b"),
            ("disclaimer", r#"(?i)(\bas is\b|\bas available\b|"as is"|\bwarrant(y|ies)\b|\bdisclaim(s|er)?\b)"#),
            ("dispute_waiver", r"(?i)\b(arbitration|class action|waive(r|s)?)\b"),
            ("damages", r"(?i)\b(consequential|incidental|punitive|indirect) damages\b"),
        ]),
    ];

    /// First-person data verb: "we collect", "we may automatically record".
    pub static ref FIRST_PERSON_DATA_VERB: Regex = Regex::new(
        r"(?i)\bwe\b(\s+\w+){0,2}?\s+(collect|gather|obtain|receive|record|store|process|track)"
    ).unwrap();

    pub static ref PERSONAL_DATA_NOUN: Regex = Regex::new(PERSONAL_DATA).unwrap();

    // =========================================================================
    // USER RIGHT KINDS
    // =========================================================================

    pub static ref RIGHT_KINDS: Vec<(&'static str, Regex)> = vec![
        ("access", Regex::new(r"(?i)\b(access|copy of your)\b").unwrap()),
        ("deletion", Regex::new(r"(?i)\b(delet(e|ion)|eras(e|ure)|remov(e|al))\b").unwrap()),
        ("opt_out", Regex::new(r"(?i)\b(opt[- ]?out|unsubscribe|object)\b").unwrap()),
        ("portability", Regex::new(r"(?i)\b(portab(le|ility)|download|export|machine[- ]readable)\b").unwrap()),
        ("correction", Regex::new(r"(?i)\b(correct(ion)?|rectif(y|ication)|update|amend)\b").unwrap()),
        ("withdraw_consent", Regex::new(r"(?i)\bwithdraw\b").unwrap()),
    ];

    // =========================================================================
    // TERMINATION ASYMMETRY
    // =========================================================================

    /// The provider grants itself the termination right.
    pub static ref UNILATERAL_TERMINATION: Regex = Regex::new(
        r"(?i)\b(we|the company|[a-z]+ reserves?)\b(\s+\w+){0,3}?\s+(terminate|suspend|cancel|discontinue|disable)"
    ).unwrap();

    pub static ref DISCRETIONARY_TERMINATION: Regex = Regex::new(DISCRETION).unwrap();

    /// Notice period in days; short periods are captured by `days`.
    pub static ref NOTICE_DAYS: Regex = Regex::new(
        r"(?i)\b(?P<days>\d{1,3})\s+days?'?\s+(prior\s+)?(written\s+)?notice\b"
    ).unwrap();

    pub static ref IMMEDIATE_TERMINATION: Regex = Regex::new(
        r"(?i)\b(immediately|with immediate effect|without (prior )?notice)\b"
    ).unwrap();

    /// The user holds a comparable right.
    pub static ref MUTUAL_TERMINATION: Regex = Regex::new(
        r"(?i)\b(either party|both parties|you may (terminate|cancel|close)|you can (terminate|cancel|close|delete your account))\b"
    ).unwrap();
}

const PERSONAL_DATA: &str = r"(?i)\b(personal (data|information)|personally identifiable|e-?mail address(es)?|phone numbers?|ip address(es)?|location data|geolocation|precise location|device (ids?|identifiers?)|(your )?name|postal address|biometric|contact (details|information)|payment (details|information)|credit card|browsing history|date of birth)\b";

const DISCRETION: &str = r"(?i)\b(at any time|sole discretion|for any reason|without (prior )?notice|without cause|without liability)\b";

/// Notice periods up to this many days count as short.
pub const SHORT_NOTICE_DAYS: u32 = 14;

/// Signature for a category.
pub fn signature(category: Category) -> Option<&'static Signature> {
    SIGNATURES.iter().find(|s| s.category == category)
}

/// Whether a first-person data verb co-occurs with a personal-data noun.
pub fn first_person_collection(text: &str) -> bool {
    FIRST_PERSON_DATA_VERB.is_match(text) && PERSONAL_DATA_NOUN.is_match(text)
}

/// Kinds of user right a clause mentions, in table order.
pub fn right_kinds(text: &str) -> Vec<&'static str> {
    RIGHT_KINDS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(kind, _)| *kind)
        .collect()
}

/// Whether the clause states a notice period of at most [`SHORT_NOTICE_DAYS`].
pub fn has_short_notice(text: &str) -> bool {
    NOTICE_DAYS.captures_iter(text).any(|caps| {
        caps.name("days")
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .is_some_and(|days| days <= SHORT_NOTICE_DAYS)
    }) || IMMEDIATE_TERMINATION.is_match(text)
}
