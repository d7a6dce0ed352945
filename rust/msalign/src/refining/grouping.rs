use std::collections::VecDeque;

use crate::models::AlignmentSpotProperty;

/// Assigns putative group ids as connected components of the link graph.
///
/// Links are treated as undirected. Components are discovered in ascending
/// alignment id order, so group ids follow the smallest member id.
/// Expects `alignment_id == index`. Returns the number of groups.
pub fn assign_peak_groups(spots: &mut [AlignmentSpotProperty]) -> usize {
    let n = spots.len();
    let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, spot) in spots.iter().enumerate() {
        for link in spot.all_links() {
            if link.to_id < n && link.to_id != i {
                neighbours[i].push(link.to_id);
                neighbours[link.to_id].push(i);
            }
        }
    }

    let mut group_of: Vec<Option<usize>> = vec![None; n];
    let mut next_group = 0;
    let mut queue = VecDeque::new();
    for start in 0..n {
        if group_of[start].is_some() {
            continue;
        }
        group_of[start] = Some(next_group);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            for &next in neighbours[current].iter() {
                if group_of[next].is_none() {
                    group_of[next] = Some(next_group);
                    queue.push_back(next);
                }
            }
        }
        next_group += 1;
    }

    for (spot, group) in spots.iter_mut().zip(group_of) {
        spot.peak_group_id = group;
    }
    next_group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        IonMode,
        LinkKind,
        SpotLink,
    };

    #[test]
    fn test_components_follow_links() {
        let mut spots: Vec<AlignmentSpotProperty> = (0..6)
            .map(|i| AlignmentSpotProperty::new(i, 100.0 + i as f64, 1.0, IonMode::Positive, 1))
            .collect();
        // 0 - 3 - 5 and 1 - 4 (one directional), 2 alone.
        spots[0].add_link(SpotLink::new(0, 3, LinkKind::Correlation, 0.99));
        spots[3].add_link(SpotLink::new(3, 0, LinkKind::Correlation, 0.99));
        spots[5].add_link(SpotLink::new(5, 3, LinkKind::Isotope, 1.0));
        spots[4].add_link(SpotLink::new(4, 1, LinkKind::AdductByRepresentative, 0.5));

        let groups = assign_peak_groups(&mut spots);
        assert_eq!(groups, 3);
        let ids: Vec<usize> = spots.iter().map(|x| x.peak_group_id.unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 0]);
    }

    #[test]
    fn test_empty() {
        assert_eq!(assign_peak_groups(&mut []), 0);
    }
}
