use super::clusterer::IsotopeClusterer;
use super::{
    BR81_BR79_DIFF,
    C13_C12_DIFF,
    MAX_ISOTOPE_TRACE,
};
use crate::models::{
    Peak,
    ScanProperty,
};

/// Annotates the isotopes of a run's picked features.
///
/// Picked features do not come grouped by spectrum, so for each unannotated
/// feature (by ascending m/z) a local spectrum is assembled from the heavier
/// unannotated features that elute within `secondary_margin` of it, and the
/// feature is clustered as the monoisotopic candidate of that spectrum.
pub fn annotate_scan_properties(features: &mut [ScanProperty], clusterer: &IsotopeClusterer) {
    let params = clusterer.params();
    let max_span = MAX_ISOTOPE_TRACE as f64 * C13_C12_DIFF.max(BR81_BR79_DIFF / 2.0)
        + params.mz_tolerance;
    let margin = params.secondary_margin;

    let mut order: Vec<usize> = (0..features.len()).collect();
    order.sort_by(|&a, &b| {
        features[a]
            .precursor_mz
            .total_cmp(&features[b].precursor_mz)
    });

    for (rank, &i) in order.iter().enumerate() {
        if features[i].isotope.is_some() {
            continue;
        }
        let focus_mz = features[i].precursor_mz;
        let focus_secondary = features[i].secondary_axis_value;

        let mut local_index = vec![i];
        for &k in order[rank + 1..].iter() {
            let other = &features[k];
            if other.precursor_mz > focus_mz + max_span {
                break;
            }
            if other.isotope.is_none()
                && (other.secondary_axis_value - focus_secondary).abs() <= margin
            {
                local_index.push(k);
            }
        }

        let mut local: Vec<Peak> = local_index.iter().map(|&k| features[k].as_peak()).collect();
        clusterer.annotate_candidate(&mut local, 0);
        for (peak, &k) in local.iter().zip(local_index.iter()) {
            if peak.isotope.is_some() {
                features[k].isotope = peak.isotope;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotopes::IsotopeClusteringParams;

    fn clusterer() -> IsotopeClusterer {
        IsotopeClusterer::new(IsotopeClusteringParams {
            mz_tolerance: 0.01,
            max_charge: 2,
            consider_halogen_isotopes: false,
            secondary_margin: 0.05,
        })
    }

    #[test]
    fn test_only_coeluting_features_join_envelope() {
        let mut features = vec![
            ScanProperty::new(10, 501.00336, 5.01, 400.0),
            ScanProperty::new(11, 500.0, 5.0, 1000.0),
            // Right mass, wrong elution.
            ScanProperty::new(12, 502.00671, 7.0, 120.0),
        ];
        annotate_scan_properties(&mut features, &clusterer());

        let mono = features[1].isotope.unwrap();
        assert_eq!(mono.weight_number, 0);
        assert_eq!(mono.parent_peak_id, 11);

        let m1 = features[0].isotope.unwrap();
        assert_eq!(m1.weight_number, 1);
        assert_eq!(m1.parent_peak_id, 11);

        let lonely = features[2].isotope.unwrap();
        assert_eq!(lonely.weight_number, 0);
        assert_eq!(lonely.parent_peak_id, 12);
    }

    #[test]
    fn test_annotated_features_are_kept() {
        let mut features = vec![ScanProperty::new(0, 500.0, 5.0, 1000.0)];
        annotate_scan_properties(&mut features, &clusterer());
        let before = features.clone();
        annotate_scan_properties(&mut features, &clusterer());
        assert_eq!(features, before);
        assert!(features.iter().all(|x| x.isotope.is_some()));
    }
}
