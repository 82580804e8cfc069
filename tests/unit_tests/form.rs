use festokes::config::{Discretization, Extra, Extras, MeshFamily, PressureElement, VelocityElement};
use festokes::exact::{BoundaryData, ExactSolution, ManufacturedFlow};
use festokes::form::{
    BoundaryTerm, DiscretizationError, FormAssembler, LoadTerm, SkeletonTerm, VolumeTerm, GRAD_DIV_COEFFICIENT,
    PRESSURE_REGULARIZATION,
};
use festokes::mesh::builder::MeshBuilder;
use festokes::space::{ScalarSpace, SpacePair, SpacePairBuilder, VectorSpace};

fn exact() -> ExactSolution {
    ExactSolution::new(ManufacturedFlow::Trigonometric, BoundaryData::Exact)
}

fn space_pair(velocity: VelocityElement, pressure: PressureElement, extras: &Extras) -> SpacePair {
    let level = MeshBuilder.build_mesh(MeshFamily::TypeOne, extras, 0);
    let discretization = Discretization::new(MeshFamily::TypeOne, velocity, pressure, extras.clone());
    SpacePairBuilder.build(&level, &discretization)
}

#[test]
fn plain_stokes_forms() {
    let extras = Extras::new();
    let space = space_pair(VelocityElement::P2, PressureElement::P1, &extras);
    let (bilinear, linear) = FormAssembler.assemble(&space, &exact(), &extras).unwrap();
    assert_eq!(
        bilinear.volume,
        vec![
            VolumeTerm::Viscous,
            VolumeTerm::PressureCoupling,
            VolumeTerm::PressureRegularization {
                epsilon: PRESSURE_REGULARIZATION
            },
        ]
    );
    assert!(bilinear.skeleton.is_empty());
    assert!(bilinear.boundary.is_empty());
    assert_eq!(linear.terms, vec![LoadTerm::BodyForce]);
    assert_eq!(linear.exact, exact());
}

#[test]
fn interior_penalty_scales_with_velocity_order() {
    let extras = Extras::from([Extra::InteriorPenalty]);
    let space = space_pair(VelocityElement::P2Star, PressureElement::P1Star, &extras);
    let (bilinear, linear) = FormAssembler.assemble(&space, &exact(), &extras).unwrap();
    let penalty = 20.0 * 9.0;
    assert_eq!(bilinear.skeleton, vec![SkeletonTerm::InteriorPenalty { penalty }]);
    assert_eq!(bilinear.boundary, vec![BoundaryTerm::InteriorPenalty { penalty }]);
    assert_eq!(linear.volume_terms().count(), 1);
    assert_eq!(
        linear.boundary_terms().collect::<Vec<_>>(),
        vec![&LoadTerm::BoundaryPenalty { penalty }]
    );
}

#[test]
fn stabilizations_add_their_terms() {
    let extras = Extras::from([Extra::GradDiv, Extra::BrezziPitkaranta, Extra::PressureJump]);
    let space = space_pair(VelocityElement::P1, PressureElement::P1, &extras);
    let (bilinear, _) = FormAssembler.assemble(&space, &exact(), &extras).unwrap();
    assert_eq!(bilinear.volume.len(), 5);
    assert!(bilinear.volume.contains(&VolumeTerm::BrezziPitkaranta));
    assert!(bilinear.volume.contains(&VolumeTerm::GradDiv {
        coefficient: GRAD_DIV_COEFFICIENT
    }));
    assert_eq!(bilinear.skeleton.len(), 2);
    assert!(bilinear.skeleton.contains(&SkeletonTerm::PressureJump));
    assert!(bilinear.skeleton.contains(&SkeletonTerm::NormalJump {
        coefficient: GRAD_DIV_COEFFICIENT
    }));
    assert!(bilinear.boundary.is_empty());
}

#[test]
fn mesh_and_space_extras_add_no_terms() {
    let extras = Extras::from([Extra::AlfeldSplit, Extra::PowellSabinSplit, Extra::P3Bubble]);
    let space = space_pair(VelocityElement::P2, PressureElement::P1Star, &extras);
    let (bilinear, linear) = FormAssembler.assemble(&space, &exact(), &extras).unwrap();
    assert_eq!(bilinear.volume.len(), 3);
    assert!(bilinear.skeleton.is_empty());
    assert_eq!(linear.terms.len(), 1);
}

#[test]
fn face_terms_require_dg_jumps() {
    let level = MeshBuilder.build_mesh(MeshFamily::TypeOne, &Extras::new(), 0);
    let space = SpacePair::new(
        VectorSpace::lagrange(&level, 2, false),
        None,
        ScalarSpace::lagrange(&level, 1, false),
        false,
    );
    for extra in [Extra::InteriorPenalty, Extra::PressureJump, Extra::GradDiv] {
        let err = FormAssembler
            .assemble(&space, &exact(), &Extras::from([extra]))
            .unwrap_err();
        assert_eq!(err, DiscretizationError::MissingDgJumps);
        assert!(err.to_string().contains("DG jumps"));
    }
    // Volume stabilization is fine without jumps
    assert!(FormAssembler
        .assemble(&space, &exact(), &Extras::from([Extra::BrezziPitkaranta]))
        .is_ok());
}
