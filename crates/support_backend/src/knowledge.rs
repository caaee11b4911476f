struct Article {
    keywords: &'static [&'static str],
    body: &'static str,
}

const ARTICLES: &[Article] = &[
    Article {
        keywords: &["refund", "credit", "downtime"],
        body: "Refund policy: Enterprise customers affected by an outage may receive a service credit of up to 20% of the monthly fee. Apply credits from Billing > Adjustments and note the incident id.",
    },
    Article {
        keywords: &["latency", "502", "gateway", "timeout"],
        body: "Troubleshooting 502/latency: check the status page for regional incidents, collect the trace id from the request logs, and escalate to on-call if more than one region is affected.",
    },
    Article {
        keywords: &["billing", "invoice", "charge"],
        body: "Billing inquiries: invoices are issued on the 1st. Duplicate charges are reversed within 5 business days after confirmation from Finance.",
    },
    Article {
        keywords: &["user", "seat", "invite"],
        body: "Adding users: workspace admins can invite members from Settings > Team. Each invite consumes one seat on the current plan.",
    },
];

/// Best article for `query`, or guidance when nothing useful was asked.
pub(crate) fn answer(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        return "No query provided. Search for a policy name, error code, or product area."
            .to_string();
    }

    let lowered = query.to_ascii_lowercase();
    ARTICLES
        .iter()
        .map(|article| {
            let hits = article
                .keywords
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count();
            (hits, article)
        })
        .filter(|(hits, _)| *hits > 0)
        .max_by_key(|(hits, _)| *hits)
        .map(|(_, article)| article.body.to_string())
        .unwrap_or_else(|| {
            format!("No articles matched \"{query}\". Try a shorter query or a specific error code.")
        })
}
