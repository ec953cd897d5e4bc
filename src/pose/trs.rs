use cgmath::{InnerSpace, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3, vec3};

/// Translation, rotation, (non-uniform) scale. Composes as T * R * S.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TRS {
    pub translation: Vector3<f64>,
    pub rotation: Quaternion<f64>,
    pub scale: Vector3<f64>,
}

impl TRS {
    pub fn identity() -> TRS {
        TRS {
            translation: vec3(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: vec3(1.0, 1.0, 1.0),
        }
    }

    /// Splits an affine matrix into a TRS. Shear is lost. A negative
    /// determinant is put into the X scale.
    pub fn decompose(m: &Matrix4<f64>) -> TRS {
        let translation = m.w.truncate();

        let x = m.x.truncate();
        let y = m.y.truncate();
        let z = m.z.truncate();
        let mut scale = vec3(x.magnitude(), y.magnitude(), z.magnitude());
        if Matrix3::from_cols(x, y, z).determinant() < 0.0 {
            scale.x = -scale.x;
        }

        // Bump scalings that are too close to zero.
        let adjust_scale_factor = |s: f64| {
            static SMALL: f64 = 0.000_001;
            if s >= 0.0 && s < SMALL {
                SMALL
            } else if s <= 0.0 && s > -SMALL {
                -SMALL
            } else {
                s
            }
        };
        let (sx, sy, sz) = (
            adjust_scale_factor(scale.x),
            adjust_scale_factor(scale.y),
            adjust_scale_factor(scale.z),
        );

        let rot = Matrix3::from_cols(x / sx, y / sy, z / sz);
        let rotation = Quaternion::from(orthonormalize(rot)).normalize();

        TRS { translation, rotation, scale }
    }
}

/// Gram-Schmidt, so that numerical noise doesn't leak into the quaternion.
fn orthonormalize(m: Matrix3<f64>) -> Matrix3<f64> {
    let x = m.x.normalize();
    let y = (m.y - x * x.dot(m.y)).normalize();
    let z = x.cross(y);
    // Keep z pointing the way the input did.
    let z = if z.dot(m.z) < 0.0 { -z } else { z };
    Matrix3::from_cols(x, y, z)
}

impl<'a> ::std::convert::From<&'a TRS> for Matrix4<f64> {
    fn from(trs: &'a TRS) -> Matrix4<f64> {
        let s = trs.scale;
        Matrix4::from_translation(trs.translation) *
            Matrix4::from(trs.rotation) *
            Matrix4::from_nonuniform_scale(s.x, s.y, s.z)
    }
}

/// The 3x3 linear part of an affine matrix.
pub fn linear_part(m: &Matrix4<f64>) -> Matrix3<f64> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

/// Makes each quaternion lie in the same hemisphere as the one before it, so
/// interpolating between neighbours takes the short way round.
pub fn make_continuous(quats: &mut [Quaternion<f64>]) {
    for i in 1..quats.len() {
        if quats[i].dot(quats[i - 1]) < 0.0 {
            quats[i] = -quats[i];
        }
    }
}

#[cfg(test)]
pub fn assert_matrix_eq(a: &Matrix4<f64>, b: &Matrix4<f64>, eps: f64) {
    for i in 0..4 {
        for j in 0..4 {
            assert!((a[i][j] - b[i][j]).abs() < eps,
                "matrices differ at [{}][{}]:\n{:?}\n{:?}", i, j, a, b);
        }
    }
}
