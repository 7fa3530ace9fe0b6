//! Currency codes for BTC price pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fiat currencies a price source may report against BTC.
pub const FIAT_CURRENCIES: &[&str] = &[
    "AFN", "ALL", "DZD", "AOA", "ARS", "AMD", "AWG", "AUD", "AZN", "BSD",
    "BHD", "BDT", "BBD", "BYN", "BZD", "BMD", "BTN", "BOB", "BAM", "BWP",
    "BRL", "GBP", "BND", "BGN", "BIF", "XPF", "KHR", "CAD", "CVE", "KYD",
    "XAF", "CLP", "CNY", "COP", "KMF", "CDF", "CRC", "CUP", "CZK", "DKK",
    "DJF", "DOP", "XCD", "EGP", "ERN", "ETB", "EUR", "FKP", "FJD", "GMD",
    "GEL", "GHS", "GIP", "GTQ", "GNF", "GYD", "HTG", "HNL", "HKD", "HUF",
    "ISK", "INR", "IDR", "IRR", "IQD", "ILS", "JMD", "JPY", "JOD", "KZT",
    "KES", "KWD", "KGS", "LAK", "LBP", "LSL", "LRD", "LYD", "MOP", "MKD",
    "MGA", "MWK", "MYR", "MVR", "MRU", "MUR", "MXN", "MDL", "MNT", "MAD",
    "MZN", "MMK", "NAD", "NPR", "ANG", "TWD", "NZD", "NIO", "NGN", "KPW",
    "NOK", "OMR", "PKR", "PAB", "PGK", "PYG", "PEN", "PHP", "PLN", "QAR",
    "RON", "RUB", "RWF", "SVC", "WST", "SAR", "RSD", "SCR", "SLE", "SGD",
    "SBD", "SOS", "ZAR", "KRW", "SSP", "LKR", "SHP", "SDG", "SRD", "SZL",
    "SEK", "CHF", "SYP", "STN", "TJS", "TZS", "THB", "TOP", "TTD", "TND",
    "TRY", "TMT", "USD", "UGX", "UAH", "AED", "UYU", "UZS", "VUV", "VES",
    "VND", "XOF", "YER", "ZMW", "ZWL",
];

/// Altcoins priced in BTC.
pub const CRYPTO_CURRENCIES: &[&str] = &[
    "ACM", "ADE", "AEON", "AMIT", "ANI", "ARQ", "ASK", "AEUR", "AUS", "BSQ",
    "BEAM", "DARX", "BTM", "BZC", "BLUR", "BLK-BURNT", "CRCL", "CTSC", "CASH2", "CHA",
    "CLOAK", "XCP", "CRDS", "CROAT", "DST", "DAI", "D4RK", "DASH", "DCR", "ONION",
    "DXO", "DOGE", "DOI", "DONU", "DRGL", "EMC", "ERG", "ETH", "ETC", "ETHS",
    "FAIR", "FRTY", "FJC", "GALI", "GMCN", "GENX", "GRIN", "HATCH", "HLM", "ZEN",
    "IDA", "IRD", "KEK", "KYDC", "KORE", "ZOD", "LBC", "L-BTC", "LTC", "LCP",
    "LTZ", "LYTX", "MSR", "MASK", "MILE", "MQX", "MOX", "MBGL", "XMR", "MUE",
    "YCE", "NMC", "NAV", "NOR", "NTBC", "PENG", "PIVX", "PZDC", "PARS", "PART",
    "PRSN", "PINK", "PLE", "QMCOIN", "QBS", "QWC", "R-BTC", "RADS", "RMX", "RYO",
    "SUB1X", "SCP", "SF", "SIL", "XSL", "SPACE", "XSPEC", "USDH", "USDT-E", "TUSD",
    "TEO", "TRTL", "USDC", "UCC", "UNO", "VARIUS", "VXV", "VEIL", "VTC", "WORX",
    "WEB", "WRKZ", "XDR0", "XRC", "ZEC", "XZC", "ZEL", "ZER", "ZERC", "XND", "UPX",
];

/// Code of the currency BTC is priced in.
///
/// Codes are trimmed and upper-cased on construction, so `"ars"` and
/// `"ARS"` name the same currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    /// Get the code.
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if this is a known fiat currency.
    pub fn is_fiat(&self) -> bool {
        FIAT_CURRENCIES.contains(&self.0.as_str())
    }

    /// Check if this is a known altcoin.
    pub fn is_crypto(&self) -> bool {
        CRYPTO_CURRENCIES.contains(&self.0.as_str())
    }

    /// Check if the code is on either known list.
    pub fn is_known(&self) -> bool {
        self.is_fiat() || self.is_crypto()
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn ars() -> Self {
        Self::new("ARS")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}
