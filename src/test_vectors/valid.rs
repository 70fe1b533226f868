use crate::params::Params;

pub(crate) struct TestVector {
    pub(crate) params: Params,
    pub(crate) input: &'static [u8],
    pub(crate) nonce: [u8; 32],
    /// Tree-ordered index lists.
    pub(crate) solutions: &'static [&'static [u32]],
}

pub(crate) const VALID_TEST_VECTORS: &[TestVector] = &[TestVector {
    params: Params { n: 96, k: 5 },
    input: b"Equihash is an asymmetric PoW based on the Generalised Birthday problem.",
    nonce: [
        1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0,
    ],
    solutions: &[&[
        2261, 15185, 36112, 104243, 23779, 118390, 118332, 130041, 32642, 69878, 76925, 80080,
        45858, 116805, 92842, 111026, 15972, 115059, 85191, 90330, 68190, 122819, 81830, 91132,
        23460, 49807, 52426, 80391, 69567, 114474, 104973, 122568,
    ]],
}];
