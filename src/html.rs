use scraper::ElementRef;

/// Trimmed text content of an element and its descendants.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Last segment of a two-segment site path such as `/cinema/maya-cinemas/`.
pub fn slug_from_href(href: &str) -> Option<&str> {
    let mut parts = href.trim().trim_matches('/').split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(slug), None) if !kind.is_empty() && !slug.is_empty() => Some(slug),
        _ => None,
    }
}

/// Drops a trailing parenthetical, e.g. `"Lighthouse Cinemas (IMAX)"` becomes
/// `"Lighthouse Cinemas"`.
pub fn strip_trailing_parenthetical(s: &str) -> &str {
    let s = s.trim_end();
    if !s.ends_with(')') {
        return s;
    }
    match s.find('(') {
        Some(open) => s[..open].trim_end(),
        None => s,
    }
}

/// Drops a trailing release year or year range: `(1982)`, `(1982-83)`,
/// `(1982-1983)`. Any other parenthetical is left alone.
pub fn strip_trailing_year(title: &str) -> &str {
    let s = title.trim();
    if !s.ends_with(')') {
        return s;
    }
    let Some(open) = s.rfind('(') else {
        return s;
    };
    let inside = &s[open + 1..s.len() - 1];
    let (year, rest) = match inside.split_once('-') {
        Some((year, rest)) => (year, Some(rest)),
        None => (inside, None),
    };
    let is_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    let year_ok = year.len() == 4 && is_digits(year);
    let rest_ok = rest.is_none_or(|r| (2..=4).contains(&r.len()) && is_digits(r));
    if year_ok && rest_ok { s[..open].trim_end() } else { s }
}
