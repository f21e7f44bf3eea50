// Summary metrics over the labelled view, for `hatewatch report`.
//
// The view is the label table joined with the raw table, so each row
// carries its community, platform and engagement alongside the label.

use std::collections::{BTreeMap, HashMap};

use crate::db::models::{Label, LabelledView};

/// Cyberhate vs neutral counts within one community.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommunityBreakdown {
    pub community: String,
    pub cyberhate: usize,
    pub neutral: usize,
}

/// Headline numbers for the labelled dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_posts: usize,
    /// Share of labelled rows with label 1, as a percentage. None when
    /// nothing is labelled.
    pub cyberhate_percent: Option<f64>,
    pub most_active_community: Option<String>,
    pub top_platform: Option<String>,
    /// Sorted by total posts, then name.
    pub communities: Vec<CommunityBreakdown>,
    pub avg_comments_cyberhate: Option<f64>,
    pub avg_comments_neutral: Option<f64>,
}

impl Summary {
    pub fn from_rows(rows: &[LabelledView]) -> Self {
        let labels: Vec<Label> = rows.iter().filter_map(|r| r.label).collect();
        let cyberhate = labels.iter().filter(|l| **l == Label::Cyberhate).count();
        let cyberhate_percent =
            (!labels.is_empty()).then(|| cyberhate as f64 * 100.0 / labels.len() as f64);

        let mut by_community: BTreeMap<&str, CommunityBreakdown> = BTreeMap::new();
        for row in rows {
            let entry = by_community
                .entry(row.community.as_str())
                .or_insert_with(|| CommunityBreakdown {
                    community: row.community.clone(),
                    ..Default::default()
                });
            match row.label {
                Some(Label::Cyberhate) => entry.cyberhate += 1,
                Some(Label::Neutral) => entry.neutral += 1,
                None => {}
            }
        }
        let mut communities: Vec<CommunityBreakdown> = by_community.into_values().collect();
        communities.sort_by(|a, b| {
            (b.cyberhate + b.neutral)
                .cmp(&(a.cyberhate + a.neutral))
                .then_with(|| a.community.cmp(&b.community))
        });

        Self {
            total_posts: rows.len(),
            cyberhate_percent,
            most_active_community: mode(rows.iter().map(|r| r.community.as_str())),
            top_platform: mode(rows.iter().map(|r| r.platform.as_str())),
            communities,
            avg_comments_cyberhate: avg_comments(rows, Label::Cyberhate),
            avg_comments_neutral: avg_comments(rows, Label::Neutral),
        }
    }
}

/// Most frequent value; ties go to the alphabetically first.
fn mode<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_name, a_count), (b_name, b_count)| {
            a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
        })
        .map(|(name, _)| name.to_string())
}

fn avg_comments(rows: &[LabelledView], label: Label) -> Option<f64> {
    let matching: Vec<i64> = rows
        .iter()
        .filter(|r| r.label == Some(label))
        .map(|r| r.comments)
        .collect();
    (!matching.is_empty()).then(|| matching.iter().sum::<i64>() as f64 / matching.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(community: &str, platform: &str, comments: i64, label: Option<Label>) -> LabelledView {
        LabelledView {
            topic: Some("t".into()),
            community: community.into(),
            score: 1,
            comments,
            timestamp: "2024-05-13 10:00:00".into(),
            platform: platform.into(),
            label,
        }
    }

    #[test]
    fn test_summary_kpis() {
        let rows = vec![
            row("news", "reddit", 10, Some(Label::Cyberhate)),
            row("news", "reddit", 20, Some(Label::Neutral)),
            row("funny", "reddit", 30, Some(Label::Neutral)),
            row("bullying", "quora", 0, Some(Label::Neutral)),
        ];
        let summary = Summary::from_rows(&rows);

        assert_eq!(summary.total_posts, 4);
        assert!((summary.cyberhate_percent.unwrap() - 25.0).abs() < 1e-10);
        assert_eq!(summary.most_active_community.as_deref(), Some("news"));
        assert_eq!(summary.top_platform.as_deref(), Some("reddit"));
        assert_eq!(summary.communities[0].community, "news");
        assert_eq!(summary.communities[0].cyberhate, 1);
        assert_eq!(summary.communities[0].neutral, 1);
        assert_eq!(summary.avg_comments_cyberhate, Some(10.0));
        assert!((summary.avg_comments_neutral.unwrap() - 50.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_mode_tie_breaks_alphabetically() {
        let rows = vec![
            row("zeta", "twitter", 0, None),
            row("alpha", "quora", 0, None),
        ];
        let summary = Summary::from_rows(&rows);
        assert_eq!(summary.most_active_community.as_deref(), Some("alpha"));
        assert_eq!(summary.top_platform.as_deref(), Some("quora"));
    }

    #[test]
    fn test_empty_rows() {
        let summary = Summary::from_rows(&[]);
        assert_eq!(summary.total_posts, 0);
        assert_eq!(summary.cyberhate_percent, None);
        assert_eq!(summary.most_active_community, None);
        assert!(summary.communities.is_empty());
    }
}
