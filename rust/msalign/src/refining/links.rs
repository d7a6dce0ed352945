use tracing::debug;

use crate::models::{
    AdductIon,
    AlignmentSpotProperty,
    LinkKind,
    MatchSource,
    SpotLink,
};
use crate::utils::correlation::pearson_correlation;

/// Spot indices sorted by secondary axis center, for co-elution lookups.
struct ElutionOrder {
    by_secondary: Vec<(f64, usize)>,
}

impl ElutionOrder {
    fn new(spots: &[AlignmentSpotProperty], include: impl Fn(&AlignmentSpotProperty) -> bool) -> Self {
        let mut by_secondary: Vec<(f64, usize)> = spots
            .iter()
            .enumerate()
            .filter(|(_, x)| include(*x))
            .map(|(i, x)| (x.secondary_axis_center, i))
            .collect();
        by_secondary.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Self { by_secondary }
    }

    /// Spots whose center lies within `margin` of `secondary` (inclusive).
    fn around(&self, secondary: f64, margin: f64) -> impl Iterator<Item = usize> + '_ {
        let start = self
            .by_secondary
            .partition_point(|x| x.0 < secondary - margin);
        self.by_secondary[start..]
            .iter()
            .take_while(move |x| x.0 <= secondary + margin)
            .map(|x| x.1)
    }
}

fn link_both(spots: &mut [AlignmentSpotProperty], a: usize, b: usize, kind: LinkKind, score: f64) {
    let link = SpotLink::new(spots[a].alignment_id, spots[b].alignment_id, kind, score);
    spots[a].add_link(link);
    spots[b].add_link(link.reversed());
}

fn closeness(diff: f64, tolerance: f64) -> f64 {
    if tolerance > 0.0 {
        1.0 - diff / tolerance
    } else {
        1.0
    }
}

/// Links co-eluting monoisotopic spots whose per-file heights correlate.
///
/// Only runs when there are at least `min_files` files, fewer samples make
/// the correlation meaningless. Returns the number of linked pairs.
pub fn assign_correlation_links(
    spots: &mut [AlignmentSpotProperty],
    min_files: usize,
    threshold: f64,
    margin: f64,
) -> usize {
    let num_files = spots
        .first()
        .map(|x| x.aligned_peak_features.len())
        .unwrap_or(0);
    if num_files < min_files {
        debug!(
            "Skipping correlation links, {} files is below {}",
            num_files, min_files
        );
        return 0;
    }

    let heights: Vec<Vec<f64>> = spots.iter().map(|x| x.heights()).collect();
    let order = ElutionOrder::new(spots, |x| !x.is_isotope());
    let mut pairs = Vec::new();
    for &(secondary, a) in order.by_secondary.iter() {
        for b in order.around(secondary, margin) {
            if b <= a {
                continue;
            }
            if let Ok(r) = pearson_correlation(&heights[a], &heights[b]) {
                if r >= threshold {
                    pairs.push((a, b, r));
                }
            }
        }
    }

    for &(a, b, r) in pairs.iter() {
        link_both(spots, a, b, LinkKind::Correlation, r);
    }
    pairs.len()
}

/// Adduct of the spot's best identification, reference library first.
fn identification_adduct(spot: &AlignmentSpotProperty) -> Option<AdductIon> {
    [MatchSource::ReferenceLibrary, MatchSource::TextDatabase]
        .into_iter()
        .filter_map(|source| spot.best_match(source))
        .filter_map(|x| x.adduct.as_deref())
        .filter_map(AdductIon::from_name)
        .find(|x| x.ion_mode == spot.ion_mode)
}

fn identification_priority(spot: &AlignmentSpotProperty) -> (bool, f64) {
    match spot.best_match(MatchSource::ReferenceLibrary) {
        Some(x) => (true, x.score),
        None => (
            false,
            spot.best_match(MatchSource::TextDatabase)
                .map(|x| x.score)
                .unwrap_or(0.0),
        ),
    }
}

/// Finds an adduct (other than `anchor`) of `neutral_mass` explaining `mz`.
///
/// When `required` is set only that adduct is accepted.
fn explaining_adduct(
    anchor: &AdductIon,
    neutral_mass: f64,
    mz: f64,
    tolerance: f64,
    required: Option<&str>,
) -> Option<(AdductIon, f64)> {
    AdductIon::known_adducts(anchor.ion_mode)
        .filter(|x| x.name != anchor.name)
        .filter(|x| required.map_or(true, |name| name == x.name))
        .map(|x| (*x, (x.mz(neutral_mass) - mz).abs()))
        .filter(|(_, diff)| *diff <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Propagates the adducts of identified spots to co-eluting unidentified ones.
///
/// Identified spots are visited reference matches first, by descending score.
/// Each takes the adduct of its identification, and co-eluting spots whose
/// mass is another adduct of the same neutral mass are annotated and linked.
/// Returns the number of linked pairs.
pub fn assign_identification_links(
    spots: &mut [AlignmentSpotProperty],
    margin: f64,
    mass_tolerance: &dyn Fn(f64) -> f64,
) -> usize {
    let order = ElutionOrder::new(spots, |x| !x.is_isotope());
    let mut identified: Vec<usize> = (0..spots.len())
        .filter(|&i| spots[i].is_identified())
        .collect();
    identified.sort_by(|&a, &b| {
        let (ref_a, score_a) = identification_priority(&spots[a]);
        let (ref_b, score_b) = identification_priority(&spots[b]);
        ref_b
            .cmp(&ref_a)
            .then(score_b.total_cmp(&score_a))
            .then(a.cmp(&b))
    });

    let mut linked = 0;
    for s in identified {
        let Some(anchor) = identification_adduct(&spots[s]) else {
            continue;
        };
        spots[s].adduct = Some(anchor.name.to_string());
        let neutral_mass = anchor.neutral_mass(spots[s].mass_center);

        let found: Vec<(usize, AdductIon, f64)> = order
            .around(spots[s].secondary_axis_center, margin)
            .filter(|&t| t != s && !spots[t].is_identified() && spots[t].ion_mode == anchor.ion_mode)
            .filter_map(|t| {
                let tolerance = mass_tolerance(spots[t].mass_center);
                explaining_adduct(
                    &anchor,
                    neutral_mass,
                    spots[t].mass_center,
                    tolerance,
                    spots[t].adduct.as_deref(),
                )
                .map(|(adduct, diff)| (t, adduct, closeness(diff, tolerance)))
            })
            .collect();

        for (t, adduct, score) in found {
            spots[t].adduct = Some(adduct.name.to_string());
            link_both(spots, s, t, LinkKind::AdductByIdentification, score);
            linked += 1;
        }
    }
    linked
}

/// Derives adduct relations from the masses observed in representative files.
///
/// Spots are visited by descending mean height. For each, the co-eluting spots
/// holding a feature in the same file are checked for a pair of adducts
/// sharing one neutral mass. Spots without an adduct try every known adduct,
/// the default one first, and keep the first pair that explains a neighbour.
/// Returns the number of linked pairs.
pub fn assign_representative_links(
    spots: &mut [AlignmentSpotProperty],
    margin: f64,
    mass_tolerance: &dyn Fn(f64) -> f64,
) -> usize {
    let order = ElutionOrder::new(spots, |x| !x.is_isotope());
    let mut by_height: Vec<usize> = order.by_secondary.iter().map(|x| x.1).collect();
    by_height.sort_by(|&a, &b| {
        spots[b]
            .mean_height()
            .total_cmp(&spots[a].mean_height())
            .then(a.cmp(&b))
    });

    let mut linked = 0;
    for s in by_height {
        let Some(representative) = spots[s].representative_feature().cloned() else {
            continue;
        };
        let file_id = representative.file_id;
        let ion_mode = spots[s].ion_mode;

        let neighbours: Vec<usize> = order
            .around(spots[s].secondary_axis_center, margin)
            .filter(|&t| t != s && spots[t].ion_mode == ion_mode)
            .collect();
        for t in neighbours {
            let target_id = spots[t].alignment_id;
            let already_linked = spots[s]
                .peak_links
                .iter()
                .any(|x| x.to_id == target_id && x.kind == LinkKind::AdductByRepresentative);
            if already_linked {
                continue;
            }
            let other = &spots[t].aligned_peak_features[file_id];
            if !other.is_populated()
                || (other.secondary_axis_value - representative.secondary_axis_value).abs() > margin
            {
                continue;
            }
            let other_mass = other.mass;
            let tolerance = mass_tolerance(other_mass);

            let anchors: Vec<AdductIon> = match spots[s].adduct.as_deref() {
                Some(name) => AdductIon::from_name(name).into_iter().collect(),
                None => {
                    let default = AdductIon::default_for(ion_mode, spots[s].charge);
                    std::iter::once(default)
                        .chain(
                            AdductIon::known_adducts(ion_mode)
                                .filter(|x| x.name != default.name)
                                .copied(),
                        )
                        .collect()
                }
            };
            let pair = anchors.iter().find_map(|anchor| {
                let neutral_mass = anchor.neutral_mass(representative.mass);
                explaining_adduct(
                    anchor,
                    neutral_mass,
                    other_mass,
                    tolerance,
                    spots[t].adduct.as_deref(),
                )
                .map(|(adduct, diff)| (*anchor, adduct, diff))
            });

            if let Some((anchor, adduct, diff)) = pair {
                if spots[s].adduct.is_none() {
                    spots[s].adduct = Some(anchor.name.to_string());
                }
                if spots[t].adduct.is_none() {
                    spots[t].adduct = Some(adduct.name.to_string());
                }
                link_both(
                    spots,
                    s,
                    t,
                    LinkKind::AdductByRepresentative,
                    closeness(diff, tolerance),
                );
                linked += 1;
            }
        }
    }
    linked
}

/// Gives every spot still lacking an adduct the protonated (or deprotonated)
/// form for its charge. Isotope spots inherit their parent's adduct.
pub fn assign_default_adducts(spots: &mut [AlignmentSpotProperty]) {
    for spot in spots.iter_mut().filter(|x| !x.is_isotope() && x.adduct.is_none()) {
        spot.adduct = Some(AdductIon::default_for(spot.ion_mode, spot.charge).name.to_string());
    }
    for i in 0..spots.len() {
        if !spots[i].is_isotope() || spots[i].adduct.is_some() {
            continue;
        }
        let inherited = spots[i]
            .parent_alignment_id
            .and_then(|p| spots.get(p))
            .and_then(|x| x.adduct.clone());
        let adduct = inherited.unwrap_or_else(|| {
            AdductIon::default_for(spots[i].ion_mode, spots[i].charge)
                .name
                .to_string()
        });
        spots[i].adduct = Some(adduct);
    }
}
