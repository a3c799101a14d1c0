use codesweep_core::outcome::Classification;
use codesweep_core::traits::Classifier;
use scraper::{Html, Selector};

/// Classifies event pages by their ticket box.
///
/// A valid code renders exactly one ticket row inside the
/// `div.event_tickets` container; the owning society is the parenthesised
/// part of the row's price span, e.g. `£6.00 (Swimming)` → `Swimming`.
/// Pages without the container, or with an unparseable price span, are
/// malformed; any other ticket count is a miss.
#[derive(Debug, Clone)]
pub struct TicketBoxClassifier {
    container: Selector,
    ticket_row: Selector,
    price_span: Selector,
}

impl TicketBoxClassifier {
    pub fn new() -> Self {
        Self {
            container: Selector::parse("div.event_tickets").expect("static selector"),
            ticket_row: Selector::parse("div.event_ticket").expect("static selector"),
            price_span: Selector::parse("span").expect("static selector"),
        }
    }
}

impl Default for TicketBoxClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for TicketBoxClassifier {
    fn classify(&self, body: &str, _status: u16) -> Classification {
        let document = Html::parse_document(body);

        let Some(ticket_box) = document.select(&self.container).next() else {
            return Classification::Malformed {
                detail: "ticket container not found".to_string(),
            };
        };

        let rows: Vec<_> = ticket_box.select(&self.ticket_row).collect();
        if rows.len() != 1 {
            return Classification::NoMatch;
        }

        let Some(span) = rows[0].select(&self.price_span).next() else {
            return Classification::Malformed {
                detail: "ticket row has no price span".to_string(),
            };
        };
        let span_text: String = span.text().collect();

        match parenthesised(&span_text) {
            Some(label) if !label.is_empty() => Classification::Match { label },
            _ => Classification::Malformed {
                detail: format!("no society name in price span: {span_text:?}"),
            },
        }
    }
}

/// Text between the first `(` and the following `)`, trimmed.
fn parenthesised(text: &str) -> Option<String> {
    let open = text.find('(')?;
    let rest = &text[open + 1..];
    let close = rest.find(')')?;
    Some(rest[..close].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(tickets: &[&str]) -> String {
        let rows: String = tickets
            .iter()
            .map(|span| format!(r#"<div class="event_ticket"><span>{span}</span></div>"#))
            .collect();
        format!(
            r#"<html><body><div class="event_tickets">{rows}</div></body></html>"#
        )
    }

    #[test]
    fn test_single_ticket_is_a_match_with_society_label() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&["£6.00 (Swimming)"]);
        assert_eq!(
            classifier.classify(&body, 200),
            Classification::Match {
                label: "Swimming".to_string()
            }
        );
    }

    #[test]
    fn test_zero_tickets_is_no_match() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&[]);
        assert_eq!(classifier.classify(&body, 200), Classification::NoMatch);
    }

    #[test]
    fn test_multiple_tickets_is_no_match() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&["£6.00 (Swimming)", "£4.50 (Karate)"]);
        assert_eq!(classifier.classify(&body, 200), Classification::NoMatch);
    }

    #[test]
    fn test_missing_container_is_malformed() {
        let classifier = TicketBoxClassifier::new();
        let body = "<html><body><p>Event not found</p></body></html>";
        assert!(matches!(
            classifier.classify(body, 200),
            Classification::Malformed { .. }
        ));
    }

    #[test]
    fn test_ticket_without_span_is_malformed() {
        let classifier = TicketBoxClassifier::new();
        let body = r#"<html><body><div class="event_tickets"><div class="event_ticket">bare</div></div></body></html>"#;
        assert!(matches!(
            classifier.classify(body, 200),
            Classification::Malformed { .. }
        ));
    }

    #[test]
    fn test_span_without_parentheses_is_malformed() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&["£6.00 Swimming"]);
        assert!(matches!(
            classifier.classify(&body, 200),
            Classification::Malformed { .. }
        ));
    }

    #[test]
    fn test_label_is_trimmed() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&["£6.00 ( Ultimate Frisbee )"]);
        assert_eq!(
            classifier.classify(&body, 200),
            Classification::Match {
                label: "Ultimate Frisbee".to_string()
            }
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = TicketBoxClassifier::new();
        let body = page(&["£6.00 (Swimming)"]);
        assert_eq!(
            classifier.classify(&body, 200),
            classifier.classify(&body, 200)
        );
    }
}
