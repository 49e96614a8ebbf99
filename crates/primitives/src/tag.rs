//! Backend type tags and fixed-size tag sets.
//!
//! # Role
//!
//! A [`TypeTag`] names the backend or behavior an argument is associated with.
//! Tags form a closed enumeration ordered by dispatch priority: a larger
//! discriminant wins during extraction. [`TypeTagSet`] is a single machine word
//! holding any subset of the concrete tags.
//!
//! # Invariants
//!
//! - [`TypeTag::Undefined`] is never a member of a [`TypeTagSet`]; the empty set
//!   is the "undefined" value and extracts to [`TypeTag::Undefined`].
//! - Extraction is a pure bit operation and never allocates.

use std::fmt;

use smallvec::SmallVec;

/// A backend or behavior tag, ordered by dispatch priority (ascending).
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	strum::Display,
	strum::EnumString,
	strum::IntoStaticStr,
	strum::EnumCount,
	strum::EnumIter,
)]
#[repr(u8)]
pub enum TypeTag {
	/// No tag could be derived.
	#[strum(serialize = "Undefined")]
	Undefined = 0,
	#[strum(serialize = "CPU")]
	Cpu,
	#[strum(serialize = "CUDA")]
	Cuda,
	#[strum(serialize = "HIP")]
	Hip,
	#[strum(serialize = "FPGA")]
	Fpga,
	#[strum(serialize = "MSNPU")]
	Msnpu,
	#[strum(serialize = "XLA")]
	Xla,
	#[strum(serialize = "MKLDNN")]
	Mkldnn,
	#[strum(serialize = "OpenGL")]
	OpenGl,
	#[strum(serialize = "OpenCL")]
	OpenCl,
	#[strum(serialize = "IDEEP")]
	Ideep,
	#[strum(serialize = "QuantizedCPU")]
	QuantizedCpu,
	#[strum(serialize = "ComplexCPU")]
	ComplexCpu,
	#[strum(serialize = "ComplexCUDA")]
	ComplexCuda,
	#[strum(serialize = "SparseCPU")]
	SparseCpu,
	#[strum(serialize = "SparseCUDA")]
	SparseCuda,
	#[strum(serialize = "SparseHIP")]
	SparseHip,
	/// Wrapper behavior that runs before any backend kernel.
	#[strum(serialize = "Autograd")]
	Autograd,
	/// Recording behavior; highest priority.
	#[strum(serialize = "Tracer")]
	Tracer,
}

impl TypeTag {
	/// Every concrete tag, lowest priority first. Index `i` holds bit `i`.
	pub const CONCRETE: [TypeTag; 18] = [
		Self::Cpu,
		Self::Cuda,
		Self::Hip,
		Self::Fpga,
		Self::Msnpu,
		Self::Xla,
		Self::Mkldnn,
		Self::OpenGl,
		Self::OpenCl,
		Self::Ideep,
		Self::QuantizedCpu,
		Self::ComplexCpu,
		Self::ComplexCuda,
		Self::SparseCpu,
		Self::SparseCuda,
		Self::SparseHip,
		Self::Autograd,
		Self::Tracer,
	];

	/// Returns true for every tag except [`TypeTag::Undefined`].
	#[inline]
	pub const fn is_concrete(self) -> bool {
		!matches!(self, Self::Undefined)
	}

	/// Slot index of a concrete tag in fixed-size tables (`0..CONCRETE.len()`).
	#[inline]
	pub const fn slot(self) -> Option<usize> {
		match self {
			Self::Undefined => None,
			_ => Some(self as usize - 1),
		}
	}

	/// Returns the single-member set for this tag (empty for `Undefined`).
	#[inline]
	pub const fn as_set(self) -> TypeTagSet {
		match self.slot() {
			Some(slot) => TypeTagSet::from_bits_retain(1 << slot),
			None => TypeTagSet::empty(),
		}
	}
}

bitflags::bitflags! {
	/// A set of concrete [`TypeTag`]s packed into one word.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct TypeTagSet: u32 {
		const CPU = 1 << 0;
		const CUDA = 1 << 1;
		const HIP = 1 << 2;
		const FPGA = 1 << 3;
		const MSNPU = 1 << 4;
		const XLA = 1 << 5;
		const MKLDNN = 1 << 6;
		const OPENGL = 1 << 7;
		const OPENCL = 1 << 8;
		const IDEEP = 1 << 9;
		const QUANTIZED_CPU = 1 << 10;
		const COMPLEX_CPU = 1 << 11;
		const COMPLEX_CUDA = 1 << 12;
		const SPARSE_CPU = 1 << 13;
		const SPARSE_CUDA = 1 << 14;
		const SPARSE_HIP = 1 << 15;
		const AUTOGRAD = 1 << 16;
		const TRACER = 1 << 17;
	}
}

impl TypeTagSet {
	/// Returns the highest-priority member, or [`TypeTag::Undefined`] when empty.
	///
	/// Bits outside the named tags are ignored.
	#[inline]
	pub const fn highest_priority(self) -> TypeTag {
		let bits = self.bits() & Self::all().bits();
		if bits == 0 {
			return TypeTag::Undefined;
		}
		let top = (u32::BITS - 1 - bits.leading_zeros()) as usize;
		TypeTag::CONCRETE[top]
	}

	/// Returns true if `tag` is a member. Always false for `Undefined`.
	#[inline]
	pub const fn contains_tag(self, tag: TypeTag) -> bool {
		match tag.slot() {
			Some(slot) => self.bits() & (1 << slot) != 0,
			None => false,
		}
	}

	/// Iterates members from lowest to highest priority.
	pub fn iter_tags(self) -> impl Iterator<Item = TypeTag> {
		TypeTag::CONCRETE
			.into_iter()
			.filter(move |tag| self.contains_tag(*tag))
	}

	/// Collects members in ascending priority order.
	pub fn tags(self) -> SmallVec<[TypeTag; 8]> {
		self.iter_tags().collect()
	}
}

impl From<TypeTag> for TypeTagSet {
	fn from(tag: TypeTag) -> Self {
		tag.as_set()
	}
}

impl FromIterator<TypeTag> for TypeTagSet {
	fn from_iter<I: IntoIterator<Item = TypeTag>>(iter: I) -> Self {
		let mut set = TypeTagSet::empty();
		for tag in iter {
			set |= tag.as_set();
		}
		set
	}
}

impl fmt::Display for TypeTagSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[")?;
		for (i, tag) in self.iter_tags().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{tag}")?;
		}
		f.write_str("]")
	}
}
