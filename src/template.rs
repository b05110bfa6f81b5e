//! Date/time name templates.
//!
//! Archives name their folders and files by formatting a template such as
//! `yyyy-MM-dd_HH-mm-ss` against the local begin time of the data they hold.
//! A [`DateTimeTemplate`] is the compiled form of such a pattern and works in
//! both directions: formatting a timestamp into a name, and parsing a name
//! back into a timestamp without borrowing any component from "now".

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::{Error, Result};

/// Date used for components a template does not encode.
pub const ZERO_DATE: Date = match Date::from_calendar_date(1, Month::January, 1) {
    Ok(date) => date,
    Err(_) => panic!("0001-01-01 is a valid date"),
};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// Two-digit years up to this value land in the 2000s, the rest in the 1900s.
const TWO_DIGIT_YEAR_PIVOT: i32 = 29;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Year4,
    Year2,
    Month1,
    Month2,
    MonthAbbrev,
    MonthName,
    Day1,
    Day2,
    Hour1,
    Hour2,
    Minute1,
    Minute2,
    Second1,
    Second2,
    Fraction(u8),
}

impl Token {
    fn is_date(&self) -> bool {
        matches!(
            self,
            Token::Year4
                | Token::Year2
                | Token::Month1
                | Token::Month2
                | Token::MonthAbbrev
                | Token::MonthName
                | Token::Day1
                | Token::Day2
        )
    }

    fn is_time(&self) -> bool {
        matches!(
            self,
            Token::Hour1
                | Token::Hour2
                | Token::Minute1
                | Token::Minute2
                | Token::Second1
                | Token::Second2
                | Token::Fraction(_)
        )
    }
}

/// A compiled date/time name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeTemplate {
    pattern: String,
    tokens: Vec<Token>,
}

impl DateTimeTemplate {
    /// Compile a pattern. Malformed patterns are configuration errors.
    pub fn parse(pattern: &str) -> Result<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' | '"' => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|&other| other == c)
                        .ok_or_else(|| {
                            Error::config(format!("unterminated quote in template '{pattern}'"))
                        })?;
                    literal.extend(&chars[i + 1..i + 1 + close]);
                    i += close + 2;
                }
                '\\' => {
                    let escaped = chars.get(i + 1).ok_or_else(|| {
                        Error::config(format!("dangling escape in template '{pattern}'"))
                    })?;
                    literal.push(*escaped);
                    i += 2;
                }
                '%' => i += 1,
                'y' | 'M' | 'd' | 'H' | 'm' | 's' | 'f' => {
                    let run = chars[i..].iter().take_while(|&&other| other == c).count();
                    let token = letter_token(c, run).ok_or_else(|| {
                        Error::config(format!(
                            "unsupported specifier '{}' in template '{pattern}'",
                            c.to_string().repeat(run)
                        ))
                    })?;
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(token);
                    i += run;
                }
                'h' | 't' | 'g' | 'z' | 'K' | 'F' => {
                    return Err(Error::config(format!(
                        "unsupported specifier '{c}' in template '{pattern}'"
                    )));
                }
                _ => {
                    literal.push(c);
                    i += 1;
                }
            }
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether any date component (year, month, day) is encoded.
    pub fn has_date(&self) -> bool {
        self.tokens.iter().any(Token::is_date)
    }

    /// Whether any time-of-day component is encoded.
    pub fn has_time(&self) -> bool {
        self.tokens.iter().any(Token::is_time)
    }

    /// True when the template is a constant name.
    pub fn is_literal(&self) -> bool {
        !self.has_date() && !self.has_time()
    }

    pub fn format(&self, value: PrimitiveDateTime) -> String {
        let mut out = String::with_capacity(self.pattern.len() + 8);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Year4 => out.push_str(&format!("{:04}", value.year())),
                Token::Year2 => out.push_str(&format!("{:02}", value.year().rem_euclid(100))),
                Token::Month1 => out.push_str(&(value.month() as u8).to_string()),
                Token::Month2 => out.push_str(&format!("{:02}", value.month() as u8)),
                Token::MonthAbbrev => {
                    out.push_str(&MONTH_NAMES[value.month() as usize - 1][..3])
                }
                Token::MonthName => out.push_str(MONTH_NAMES[value.month() as usize - 1]),
                Token::Day1 => out.push_str(&value.day().to_string()),
                Token::Day2 => out.push_str(&format!("{:02}", value.day())),
                Token::Hour1 => out.push_str(&value.hour().to_string()),
                Token::Hour2 => out.push_str(&format!("{:02}", value.hour())),
                Token::Minute1 => out.push_str(&value.minute().to_string()),
                Token::Minute2 => out.push_str(&format!("{:02}", value.minute())),
                Token::Second1 => out.push_str(&value.second().to_string()),
                Token::Second2 => out.push_str(&format!("{:02}", value.second())),
                Token::Fraction(digits) => {
                    let divisor = 10u32.pow(9 - u32::from(*digits));
                    let value = value.nanosecond() / divisor;
                    out.push_str(&format!("{:0width$}", value, width = *digits as usize));
                }
            }
        }
        out
    }

    /// Parse a complete name. Components the template lacks default to
    /// [`ZERO_DATE`] and midnight.
    pub fn parse_value(&self, name: &str) -> Option<PrimitiveDateTime> {
        let mut rest = name;
        let mut year = ZERO_DATE.year();
        let mut month = 1u8;
        let mut day = 1u8;
        let mut hour = 0u8;
        let mut minute = 0u8;
        let mut second = 0u8;
        let mut nanos = 0u32;

        for token in &self.tokens {
            match token {
                Token::Literal(text) => rest = rest.strip_prefix(text.as_str())?,
                Token::Year4 => year = take_digits(&mut rest, 4, 4)? as i32,
                Token::Year2 => {
                    let short = take_digits(&mut rest, 2, 2)? as i32;
                    year = if short <= TWO_DIGIT_YEAR_PIVOT {
                        2000 + short
                    } else {
                        1900 + short
                    };
                }
                Token::Month1 => month = take_digits(&mut rest, 1, 2)? as u8,
                Token::Month2 => month = take_digits(&mut rest, 2, 2)? as u8,
                Token::MonthAbbrev | Token::MonthName => {
                    let full = matches!(token, Token::MonthName);
                    month = take_month_name(&mut rest, full)?;
                }
                Token::Day1 => day = take_digits(&mut rest, 1, 2)? as u8,
                Token::Day2 => day = take_digits(&mut rest, 2, 2)? as u8,
                Token::Hour1 => hour = take_digits(&mut rest, 1, 2)? as u8,
                Token::Hour2 => hour = take_digits(&mut rest, 2, 2)? as u8,
                Token::Minute1 => minute = take_digits(&mut rest, 1, 2)? as u8,
                Token::Minute2 => minute = take_digits(&mut rest, 2, 2)? as u8,
                Token::Second1 => second = take_digits(&mut rest, 1, 2)? as u8,
                Token::Second2 => second = take_digits(&mut rest, 2, 2)? as u8,
                Token::Fraction(digits) => {
                    let value = take_digits(&mut rest, *digits as usize, *digits as usize)?;
                    nanos = value * 10u32.pow(9 - u32::from(*digits));
                }
            }
        }

        if !rest.is_empty() {
            return None;
        }

        let month = Month::try_from(month).ok()?;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let time = Time::from_hms_nano(hour, minute, second, nanos).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }
}

fn letter_token(letter: char, run: usize) -> Option<Token> {
    let token = match (letter, run) {
        ('y', 2) => Token::Year2,
        ('y', 4) => Token::Year4,
        ('M', 1) => Token::Month1,
        ('M', 2) => Token::Month2,
        ('M', 3) => Token::MonthAbbrev,
        ('M', 4) => Token::MonthName,
        ('d', 1) => Token::Day1,
        ('d', 2) => Token::Day2,
        ('H', 1) => Token::Hour1,
        ('H', 2) => Token::Hour2,
        ('m', 1) => Token::Minute1,
        ('m', 2) => Token::Minute2,
        ('s', 1) => Token::Second1,
        ('s', 2) => Token::Second2,
        ('f', 1..=7) => Token::Fraction(run as u8),
        _ => return None,
    };
    Some(token)
}

fn take_digits(rest: &mut &str, min: usize, max: usize) -> Option<u32> {
    let len = rest
        .bytes()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len < min {
        return None;
    }
    let (digits, tail) = rest.split_at(len);
    *rest = tail;
    digits.parse().ok()
}

fn take_month_name(rest: &mut &str, full: bool) -> Option<u8> {
    for (index, name) in MONTH_NAMES.iter().enumerate() {
        let candidate = if full { *name } else { &name[..3] };
        let Some(head) = rest.get(..candidate.len()) else {
            continue;
        };
        if head.eq_ignore_ascii_case(candidate) {
            *rest = &rest[candidate.len()..];
            return Some(index as u8 + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_full_template() {
        let template = DateTimeTemplate::parse("yyyy-MM-dd_HH-mm-ss").unwrap();
        assert_eq!(
            template.format(datetime!(2020-01-02 03:04:05)),
            "2020-01-02_03-04-05"
        );
    }

    #[test]
    fn quoted_literals_survive_formatting() {
        let template = DateTimeTemplate::parse("'data_'yyyy'.dat'").unwrap();
        assert_eq!(template.format(datetime!(2019-12-31 00:00)), "data_2019.dat");
        assert!(template.has_date());
        assert!(!template.has_time());
    }

    #[test]
    fn wildcards_are_literals() {
        let template = DateTimeTemplate::parse("yyyy-MM-dd_*'.dat'").unwrap();
        assert_eq!(template.format(datetime!(2020-05-06 00:00)), "2020-05-06_*.dat");
    }

    #[test]
    fn parses_date_and_time() {
        let template = DateTimeTemplate::parse("yyyy-MM-ddTHH-mm-ss.fff").unwrap();
        let parsed = template.parse_value("2020-01-02T10-20-30.250").unwrap();
        assert_eq!(parsed, datetime!(2020-01-02 10:20:30.25));
    }

    #[test]
    fn time_only_uses_zero_date() {
        let template = DateTimeTemplate::parse("HH-mm-ss").unwrap();
        let parsed = template.parse_value("12-30-00").unwrap();
        assert_eq!(parsed.date(), ZERO_DATE);
        assert_eq!(parsed.hour(), 12);
        assert!(template.has_time());
        assert!(!template.has_date());
    }

    #[test]
    fn date_only_uses_midnight() {
        let template = DateTimeTemplate::parse("yyyy-MM").unwrap();
        let parsed = template.parse_value("2020-02").unwrap();
        assert_eq!(parsed, datetime!(2020-02-01 00:00));
    }

    #[test]
    fn rejects_trailing_and_short_input() {
        let template = DateTimeTemplate::parse("yyyy-MM-dd").unwrap();
        assert!(template.parse_value("2020-01-02.dat").is_none());
        assert!(template.parse_value("2020-1-02").is_none());
        assert!(template.parse_value("2020-13-02").is_none());
    }

    #[test]
    fn constant_template_matches_only_itself() {
        let template = DateTimeTemplate::parse("'DATA'").unwrap();
        assert!(template.is_literal());
        assert_eq!(
            template.parse_value("DATA"),
            Some(PrimitiveDateTime::new(ZERO_DATE, Time::MIDNIGHT))
        );
        assert!(template.parse_value("DATA2").is_none());
    }

    #[test]
    fn month_names_and_short_years() {
        let template = DateTimeTemplate::parse("dd MMM yy").unwrap();
        assert_eq!(template.format(datetime!(2021-03-09 00:00)), "09 Mar 21");
        assert_eq!(
            template.parse_value("09 mar 21"),
            Some(datetime!(2021-03-09 00:00))
        );
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(matches!(
            DateTimeTemplate::parse("yyyy'-MM"),
            Err(Error::Configuration(_))
        ));
        assert!(DateTimeTemplate::parse("yyyy\\").is_err());
        assert!(DateTimeTemplate::parse("yyy").is_err());
        assert!(DateTimeTemplate::parse("hh:mm tt").is_err());
    }
}
