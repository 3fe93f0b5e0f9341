pub mod ad;
pub mod dates;

pub use ad::{
    Ad, AdFilter, AdPatch, AdScope, AdSummary, AdType, Counter, CreateAdRequest,
    DeleteAllResponse, FilterQuery, NewAd, UpdateAdRequest, ValidationError,
};
