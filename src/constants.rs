//! Well-known Maestro block and property names.
//!
//! These are chemistry conventions used by consumers of the format; the
//! parser itself does not enforce any of them.

/// Header property carrying the file format version.
pub const MAE_FORMAT_VERSION: &str = "s_m_m2io_version";

/// Version string written by [`Writer`](crate::Writer) header blocks.
pub const MAE_FORMAT_VERSION_VALUE: &str = "2.0.0";

/// Outer block holding one connection table (structure).
pub const CT_BLOCK: &str = "f_m_ct";

/// Structure title property.
pub const CT_TITLE: &str = "s_m_title";

/// Indexed block holding per-atom columns.
pub const ATOM_BLOCK: &str = "m_atom";

/// Atomic number column.
pub const ATOM_ATOMIC_NUM: &str = "i_m_atomic_number";

/// Cartesian coordinate columns.
pub const ATOM_X_COORD: &str = "r_m_x_coord";
pub const ATOM_Y_COORD: &str = "r_m_y_coord";
pub const ATOM_Z_COORD: &str = "r_m_z_coord";

/// Formal charge column.
pub const ATOM_FORMAL_CHARGE: &str = "i_m_formal_charge";

/// Partial charge column.
pub const ATOM_PARTIAL_CHARGE: &str = "r_m_charge1";

/// Indexed block holding per-bond columns.
pub const BOND_BLOCK: &str = "m_bond";

/// Bond endpoint columns (1-based atom indices).
pub const BOND_ATOM_1: &str = "i_m_from";
pub const BOND_ATOM_2: &str = "i_m_to";

/// Bond order column.
pub const BOND_ORDER: &str = "i_m_order";
