use std::cmp::Ordering;

use crate::models::{
    AlignmentSpotProperty,
    MatchSource,
};

/// Counts of one merge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub empty_dropped: usize,
    pub duplicates_dropped: usize,
    pub orphan_isotopes_dropped: usize,
}

/// Retained masters, kept sorted by mass for range lookups.
struct RetainedMasters<'a> {
    spots: &'a [AlignmentSpotProperty],
    by_mass: Vec<(f64, usize)>,
}

impl<'a> RetainedMasters<'a> {
    fn new(spots: &'a [AlignmentSpotProperty]) -> Self {
        Self {
            spots,
            by_mass: Vec::new(),
        }
    }

    fn has_duplicate(&self, candidate: usize, mass_tolerance: f64, secondary_tolerance: f64) -> bool {
        let spot = &self.spots[candidate];
        let start = self
            .by_mass
            .partition_point(|x| x.0 <= spot.mass_center - mass_tolerance);
        self.by_mass[start..]
            .iter()
            .take_while(|x| x.0 < spot.mass_center + mass_tolerance)
            .any(|&(_, master)| {
                (self.spots[master].secondary_axis_center - spot.secondary_axis_center).abs()
                    < secondary_tolerance
            })
    }

    fn insert(&mut self, index: usize) {
        let mass = self.spots[index].mass_center;
        let at = self.by_mass.partition_point(|x| x.0 <= mass);
        self.by_mass.insert(at, (mass, index));
    }
}

fn by_descending_score(
    spots: &[AlignmentSpotProperty],
    source: MatchSource,
) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |&a, &b| {
        let score = |i: usize| spots[i].best_match(source).map(|x| x.score).unwrap_or(0.0);
        score(b).total_cmp(&score(a)).then(a.cmp(&b))
    }
}

/// Decides which spots survive deduplication.
///
/// Candidates are visited in priority order: reference library matches by
/// descending score, text database matches by descending score, then the
/// remaining monoisotopic spots by descending mean height. A candidate is
/// dropped when an already retained spot lies within `mass_tolerance(mass)`
/// (exclusive) and `secondary_tolerance` (exclusive), otherwise it is retained.
///
/// Unidentified isotope spots skip the comparison and are kept only when
/// their parent spot was retained. Spots without any populated feature are
/// dropped upfront.
///
/// Returns the retained flag per input spot.
pub fn select_retained(
    spots: &[AlignmentSpotProperty],
    mass_tolerance: impl Fn(f64) -> f64,
    secondary_tolerance: f64,
) -> (Vec<bool>, MergeOutcome) {
    let mut outcome = MergeOutcome::default();
    let mut retained = vec![false; spots.len()];

    let mut reference = Vec::new();
    let mut text = Vec::new();
    let mut unidentified = Vec::new();
    let mut isotopes = Vec::new();
    for (i, spot) in spots.iter().enumerate() {
        if spot.populated_features().next().is_none() {
            outcome.empty_dropped += 1;
        } else if spot.is_reference_matched() {
            reference.push(i);
        } else if spot.is_text_db_matched() {
            text.push(i);
        } else if spot.is_isotope() {
            isotopes.push(i);
        } else {
            unidentified.push(i);
        }
    }
    reference.sort_by(by_descending_score(spots, MatchSource::ReferenceLibrary));
    text.sort_by(by_descending_score(spots, MatchSource::TextDatabase));
    unidentified.sort_by(|&a, &b| {
        spots[b]
            .mean_height()
            .total_cmp(&spots[a].mean_height())
            .then(a.cmp(&b))
    });

    let mut masters = RetainedMasters::new(spots);
    for candidate in reference.into_iter().chain(text).chain(unidentified) {
        let tolerance = mass_tolerance(spots[candidate].mass_center);
        if masters.has_duplicate(candidate, tolerance, secondary_tolerance) {
            outcome.duplicates_dropped += 1;
            continue;
        }
        masters.insert(candidate);
        retained[candidate] = true;
    }

    let index_of: std::collections::HashMap<usize, usize> = spots
        .iter()
        .enumerate()
        .map(|(i, x)| (x.alignment_id, i))
        .collect();
    for candidate in isotopes {
        let parent_retained = spots[candidate]
            .parent_alignment_id
            .and_then(|x| index_of.get(&x))
            .is_some_and(|&x| retained[x]);
        if parent_retained {
            retained[candidate] = true;
        } else {
            outcome.orphan_isotopes_dropped += 1;
        }
    }

    (retained, outcome)
}
