use burst_doe::{
    config::{AxisConfig, Config, SizeClass, Variant},
    doe::ParameterSpace,
    geometry::{derive, FlawSample, PipeClass},
};
use proptest::prelude::*;

fn assert_partitions(sample: FlawSample, pipe: &PipeClass) -> Result<(), TestCaseError> {
    let g = derive(0, sample, pipe);
    let rel = (g.wall_sum() - pipe.thickness).abs() / pipe.thickness;
    prop_assert!(rel <= 1e-12, "wall sum {} vs thickness {}", g.wall_sum(), pipe.thickness);
    prop_assert_eq!(g.segments.iter().filter(|s| s.dependent).count(), 1);
    Ok(())
}

proptest! {
    #[test]
    fn crack_corrosion_partitions_wall(
        crack_length in 0.0001f64..0.004,
        ligament_2 in 0.0005f64..0.01,
        loss_height in 0.0005f64..0.01,
        large_thickness in any::<bool>(),
    ) {
        let thickness = if large_thickness { SizeClass::Large } else { SizeClass::Small };
        let pipe = PipeClass::resolve(Variant::CrackCorrosion, thickness, SizeClass::Small);
        assert_partitions(
            FlawSample::CrackCorrosion { crack_length, ligament_2, loss_height },
            &pipe,
        )?;
    }

    #[test]
    fn twin_crack_partitions_wall(
        crack_length_1 in 0.0001f64..0.003,
        crack_length_2 in 0.0001f64..0.003,
        ligament_1 in 0.0005f64..0.008,
        ligament_2 in 0.0005f64..0.008,
    ) {
        let pipe = PipeClass::resolve(Variant::TwinCrack, SizeClass::Large, SizeClass::Large);
        assert_partitions(
            FlawSample::TwinCrack { crack_length_1, crack_length_2, ligament_1, ligament_2 },
            &pipe,
        )?;
    }
}

#[test]
fn builtin_grids_are_consistent() {
    for variant in Variant::ALL {
        for thickness in SizeClass::ALL {
            let mut cfg = Config::default();
            cfg.campaign.variant = variant;
            cfg.campaign.thickness_class = thickness;
            for axis in variant.axis_names() {
                cfg.axes.insert(
                    axis.to_string(),
                    AxisConfig {
                        enabled: true,
                        ..Default::default()
                    },
                );
            }
            let space = ParameterSpace::from_config(&cfg).unwrap();
            let pipe = PipeClass::resolve(variant, thickness, SizeClass::Small);
            for point in space.iter() {
                let sample = FlawSample::from_point(variant, &point).unwrap();
                let g = derive(point.index, sample, &pipe);
                assert!(
                    g.check_consistent().is_ok(),
                    "{variant} {thickness} point {} ligament {}",
                    point.index,
                    g.dependent_ligament
                );
            }
        }
    }
}

#[test]
fn depths_stay_inside_the_wall() {
    let pipe = PipeClass::resolve(Variant::TwinCrack, SizeClass::Small, SizeClass::Small);
    let g = derive(
        0,
        FlawSample::TwinCrack {
            crack_length_1: 0.0015,
            crack_length_2: 0.0015,
            ligament_1: 0.004,
            ligament_2: 0.004,
        },
        &pipe,
    );
    for c in &g.cracks {
        assert!(c.depth - c.half_length >= 0.0);
        assert!(c.depth + c.half_length <= pipe.thickness);
    }
    assert!(g.check_consistent().is_ok());
}
