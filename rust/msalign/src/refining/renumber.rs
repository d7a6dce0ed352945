use std::collections::HashMap;

use crate::models::{
    AlignmentSpotProperty,
    LinkKind,
    SpotLink,
};

/// Keeps the retained spots and gives them dense ids by ascending mass.
///
/// The previous id moves to `master_alignment_id`, parent ids and existing
/// links are remapped (dropping the ones pointing at discarded spots), and
/// every isotope spot gets an isotope link to and from its parent.
///
/// Returns the renumbered spots and the number of isotope links emitted.
pub fn renumber(spots: Vec<AlignmentSpotProperty>, retained: &[bool]) -> (Vec<AlignmentSpotProperty>, usize) {
    let mut kept: Vec<AlignmentSpotProperty> = spots
        .into_iter()
        .zip(retained.iter())
        .filter_map(|(spot, &keep)| if keep { Some(spot) } else { None })
        .collect();
    kept.sort_by(|a, b| {
        a.mass_center
            .total_cmp(&b.mass_center)
            .then(a.secondary_axis_center.total_cmp(&b.secondary_axis_center))
            .then(a.alignment_id.cmp(&b.alignment_id))
    });

    let new_id_of: HashMap<usize, usize> = kept
        .iter()
        .enumerate()
        .map(|(new_id, spot)| (spot.alignment_id, new_id))
        .collect();

    for (new_id, spot) in kept.iter_mut().enumerate() {
        spot.master_alignment_id = spot.alignment_id;
        spot.alignment_id = new_id;
        spot.parent_alignment_id = spot
            .parent_alignment_id
            .and_then(|x| new_id_of.get(&x).copied());
        for links in [&mut spot.correlation_links, &mut spot.peak_links] {
            links.retain_mut(|link| {
                match (new_id_of.get(&link.from_id), new_id_of.get(&link.to_id)) {
                    (Some(&from_id), Some(&to_id)) => {
                        link.from_id = from_id;
                        link.to_id = to_id;
                        true
                    }
                    _ => false,
                }
            });
        }
    }

    let isotope_pairs: Vec<(usize, usize)> = kept
        .iter()
        .filter(|x| x.is_isotope())
        .filter_map(|x| x.parent_alignment_id.map(|p| (x.alignment_id, p)))
        .collect();
    for &(child, parent) in isotope_pairs.iter() {
        let link = SpotLink::new(child, parent, LinkKind::Isotope, 1.0);
        kept[child].add_link(link);
        kept[parent].add_link(link.reversed());
    }

    (kept, isotope_pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IonMode;

    #[test]
    fn test_ids_are_dense_and_sorted_by_mass() {
        let spots: Vec<AlignmentSpotProperty> = [500.0, 100.0, 300.0, 200.0]
            .iter()
            .enumerate()
            .map(|(i, &mass)| AlignmentSpotProperty::new(i * 10, mass, 1.0, IonMode::Positive, 1))
            .collect();
        let (spots, _) = renumber(spots, &[true, true, false, true]);
        let ids: Vec<usize> = spots.iter().map(|x| x.alignment_id).collect();
        let masters: Vec<usize> = spots.iter().map(|x| x.master_alignment_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(masters, vec![10, 30, 0]);
        assert!(spots.windows(2).all(|w| w[0].mass_center <= w[1].mass_center));
    }

    #[test]
    fn test_parents_are_remapped_and_linked() {
        let mut parent = AlignmentSpotProperty::new(7, 300.0, 1.0, IonMode::Positive, 1);
        parent.add_link(SpotLink::new(7, 9, LinkKind::AdductByIdentification, 0.5));
        let mut child = AlignmentSpotProperty::new(3, 301.003, 1.0, IonMode::Positive, 1);
        child.isotope_weight_number = 1;
        child.parent_alignment_id = Some(7);
        let mut orphan = AlignmentSpotProperty::new(1, 400.0, 1.0, IonMode::Positive, 1);
        orphan.isotope_weight_number = 1;
        orphan.parent_alignment_id = Some(9);
        let dropped = AlignmentSpotProperty::new(9, 322.0, 1.0, IonMode::Positive, 1);

        let (spots, isotope_links) =
            renumber(vec![parent, child, orphan, dropped], &[true, true, true, false]);
        assert_eq!(isotope_links, 1);
        assert_eq!(spots[1].parent_alignment_id, Some(0));
        assert_eq!(spots[2].parent_alignment_id, None);
        // The adduct link pointed at a dropped spot.
        assert_eq!(spots[0].peak_links.len(), 1);
        assert_eq!(spots[0].peak_links[0], SpotLink::new(0, 1, LinkKind::Isotope, 1.0));
        assert_eq!(spots[1].peak_links[0], SpotLink::new(1, 0, LinkKind::Isotope, 1.0));
    }
}
