//! Human-natural ordering for the addresses that share a postcode.
//!
//! Plain string order puts "12 High Street" before "2 High Street", and
//! plain numeric order scatters flats away from their building. The sort key
//! built here groups by street first, then house number, then whatever
//! sub-premise (flat, unit) preceded the house number.
//!
//! # Algorithm
//!
//! 1. Split the address into alternating runs of digits and non-digits.
//!    Digit runs become integers. One or two letters glued to a number and
//!    ending at a space, comma or the end of the line ("10A", "2b") stay
//!    with that number as its suffix. Remaining text runs are trimmed of
//!    whitespace and commas, lowercased, and dropped if nothing is left.
//! 2. Find the last number directly followed by text that starts with a
//!    space or comma: that pair is the house number and the street.
//! 3. Rotate the runs so the street (and anything after it) comes first,
//!    then the house number, then the runs that preceded it.
//!
//! "3 Elm Street" keys as `["elm street", 3]`; "Flat 1, 9 High Street" keys
//! as `["high street", 9, "flat", 1]`; "10A High Street" keys as
//! `["high street", 10, "a"]`.

/// One component of an address sort key.
///
/// Variant order matters: at the same position a number sorts before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Number(u64),
    Text(String),
}

/// Anything that can be listed by its free-text address line.
pub trait DisplayAddress {
    fn display_address(&self) -> &str;
}

impl DisplayAddress for str {
    fn display_address(&self) -> &str {
        self
    }
}

impl DisplayAddress for String {
    fn display_address(&self) -> &str {
        self
    }
}

impl<T: DisplayAddress + ?Sized> DisplayAddress for &T {
    fn display_address(&self) -> &str {
        (**self).display_address()
    }
}

/// Build the sort key for a single address line.
pub fn sort_key(address: &str) -> Vec<KeyPart> {
    let mut segments = split_segments(address);

    let pivot = segments.windows(2).rposition(|pair| {
        matches!(
            pair,
            [Segment::Number(_), Segment::Text { separated: true, .. }]
        )
    });

    if let Some(house_idx) = pivot {
        let mut rotated = segments.split_off(house_idx + 1);
        if let Some(house_number) = segments.pop() {
            rotated.push(house_number);
        }
        rotated.extend(segments);
        segments = rotated;
    }

    segments.into_iter().flat_map(Segment::into_parts).collect()
}

/// A house number with its optional letter suffix, or a run of text.
enum Segment {
    Number(Vec<KeyPart>),
    Text {
        part: KeyPart,
        /// Starts with whitespace or a comma, so it can be a street name.
        separated: bool,
    },
}

impl Segment {
    fn into_parts(self) -> Vec<KeyPart> {
        match self {
            Segment::Number(parts) => parts,
            Segment::Text { part, .. } => vec![part],
        }
    }
}

fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run = String::new();
    let mut run_is_digits = false;

    for c in text.chars() {
        let is_digit = c.is_ascii_digit();
        if !run.is_empty() && is_digit != run_is_digits {
            push_run(&mut segments, &std::mem::take(&mut run), run_is_digits);
        }
        run_is_digits = is_digit;
        run.push(c);
    }
    if !run.is_empty() {
        push_run(&mut segments, &run, run_is_digits);
    }

    segments
}

fn push_run(segments: &mut Vec<Segment>, run: &str, digits: bool) {
    if digits {
        // Runs too long for u64 still need a deterministic place in the order.
        match run.parse::<u64>() {
            Ok(n) => segments.push(Segment::Number(vec![KeyPart::Number(n)])),
            Err(_) => segments.push(Segment::Text {
                part: KeyPart::Text(run.to_string()),
                separated: false,
            }),
        }
        return;
    }

    let mut rest = run;
    if let Some(Segment::Number(parts)) = segments.last_mut()
        && let Some((suffix, tail)) = split_suffix(run)
    {
        parts.push(KeyPart::Text(suffix.to_ascii_lowercase()));
        rest = tail;
    }

    let separated = rest.starts_with(|c: char| c.is_whitespace() || c == ',');
    let text = rest
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_ascii_lowercase();
    if !text.is_empty() {
        segments.push(Segment::Text {
            part: KeyPart::Text(text),
            separated,
        });
    }
}

/// Split a house-number suffix ("A" in "10A High Street") off the text
/// that follows a number.
fn split_suffix(text: &str) -> Option<(&str, &str)> {
    let len = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let ends_cleanly = text[len..]
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || c == ',');
    ((1..=2).contains(&len) && ends_cleanly).then(|| text.split_at(len))
}

/// Sorts a collection of addresses into human-readable order.
pub struct AddressSorter<T> {
    addresses: Vec<T>,
}

impl<T: DisplayAddress> AddressSorter<T> {
    pub fn new(addresses: Vec<T>) -> Self {
        Self { addresses }
    }

    /// Consume the sorter and return the addresses in natural order.
    ///
    /// Stable: addresses with equal keys keep their input order.
    pub fn natural_sort(mut self) -> Vec<T> {
        natural_sort(&mut self.addresses);
        self.addresses
    }
}

/// Sort a slice of addresses in place, in natural order.
pub fn natural_sort<T: DisplayAddress>(addresses: &mut [T]) {
    addresses.sort_by_cached_key(|a| sort_key(a.display_address()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> KeyPart {
        KeyPart::Text(s.to_string())
    }

    fn sorted(input: &[&str]) -> Vec<String> {
        let owned: Vec<String> = input.iter().map(|s| s.to_string()).collect();
        AddressSorter::new(owned).natural_sort()
    }

    #[test]
    fn house_number_moves_behind_street() {
        assert_eq!(
            sort_key("3 Elm Street"),
            vec![text("elm street"), KeyPart::Number(3)]
        );
    }

    #[test]
    fn flat_prefix_moves_behind_house_number() {
        assert_eq!(
            sort_key("Flat 1, 9 High Street"),
            vec![
                text("high street"),
                KeyPart::Number(9),
                text("flat"),
                KeyPart::Number(1),
            ]
        );
    }

    #[test]
    fn leading_number_pair_is_swapped() {
        assert_eq!(
            sort_key("1, 9 High Street"),
            vec![text("high street"), KeyPart::Number(9), KeyPart::Number(1)]
        );
    }

    #[test]
    fn key_without_house_number_is_unchanged() {
        assert_eq!(sort_key("Rose Cottage"), vec![text("rose cottage")]);
        assert_eq!(
            sort_key("Flat 4"),
            vec![text("flat"), KeyPart::Number(4)]
        );
        assert!(sort_key("").is_empty());
    }

    #[test]
    fn numeric_within_street_not_lexicographic() {
        let out = sorted(&["12 High Street", "2 High Street", "Flat 1, 9 High Street"]);
        assert_eq!(
            out,
            vec!["2 High Street", "Flat 1, 9 High Street", "12 High Street"]
        );
    }

    #[test]
    fn groups_by_street_before_number() {
        let out = sorted(&[
            "1 Oak Road",
            "10 Elm Street",
            "2 Oak Road",
            "3 Elm Street",
        ]);
        assert_eq!(
            out,
            vec!["3 Elm Street", "10 Elm Street", "1 Oak Road", "2 Oak Road"]
        );
    }

    #[test]
    fn building_precedes_its_flats() {
        let out = sorted(&[
            "Flat 10, 4 Mill Lane",
            "4 Mill Lane",
            "Flat 2, 4 Mill Lane",
            "5 Mill Lane",
        ]);
        assert_eq!(
            out,
            vec![
                "4 Mill Lane",
                "Flat 2, 4 Mill Lane",
                "Flat 10, 4 Mill Lane",
                "5 Mill Lane",
            ]
        );
    }

    #[test]
    fn case_does_not_split_streets() {
        let out = sorted(&["11 HIGH STREET", "7 High Street"]);
        assert_eq!(out, vec!["7 High Street", "11 HIGH STREET"]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let out = sorted(&["2 High Street", "2, High Street", "2  high street"]);
        assert_eq!(out, vec!["2 High Street", "2, High Street", "2  high street"]);
    }

    #[test]
    fn sorting_twice_is_identical() {
        let input = [
            "Flat B, 22 Station Road",
            "22 Station Road",
            "The Old Rectory",
            "Flat A, 22 Station Road",
            "100 Station Road",
            "9 Church Lane",
        ];
        let once = sorted(&input);
        let twice = sorted(&once.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(once, twice);
    }

    #[test]
    fn oversized_digit_run_does_not_panic() {
        let key = sort_key("99999999999999999999999 Long Road");
        assert_eq!(
            key,
            vec![text("99999999999999999999999"), text("long road")]
        );
    }

    #[test]
    fn letter_suffix_stays_with_house_number() {
        assert_eq!(
            sort_key("10A High Street"),
            vec![text("high street"), KeyPart::Number(10), text("a")]
        );
        let out = sorted(&[
            "10 High Street",
            "10A High Street",
            "11 High Street",
            "2 Elm Road",
        ]);
        assert_eq!(
            out,
            vec![
                "2 Elm Road",
                "10 High Street",
                "10A High Street",
                "11 High Street",
            ]
        );
    }

    #[test]
    fn lettered_flats_order_by_number_then_letter() {
        assert_eq!(
            sort_key("1 Mill Lane, Flat 2A"),
            vec![
                text("mill lane, flat"),
                KeyPart::Number(2),
                text("a"),
                KeyPart::Number(1),
            ]
        );
        let out = sorted(&["1 Mill Lane, Flat 2A", "1 Mill Lane, Flat 1B", "1 Mill Lane, Flat 1A"]);
        assert_eq!(
            out,
            vec!["1 Mill Lane, Flat 1A", "1 Mill Lane, Flat 1B", "1 Mill Lane, Flat 2A"]
        );
    }

    #[test]
    fn lettered_flat_prefix_moves_behind_house_number() {
        assert_eq!(
            sort_key("Flat 2B, 4 Mill Lane"),
            vec![
                text("mill lane"),
                KeyPart::Number(4),
                text("flat"),
                KeyPart::Number(2),
                text("b"),
            ]
        );
    }

    #[test]
    fn glued_words_are_not_suffixes_or_streets() {
        assert_eq!(
            sort_key("4Mill Lane"),
            vec![KeyPart::Number(4), text("mill lane")]
        );
    }

    #[test]
    fn sorts_borrowed_items_in_place() {
        let mut items = vec!["20 Park Row", "3 Park Row"];
        natural_sort(&mut items);
        assert_eq!(items, vec!["3 Park Row", "20 Park Row"]);
    }
}
