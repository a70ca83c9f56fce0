/*!
 * Protocol layer
 *
 * Currently a single backend: Amazon S3 and S3-compatible services,
 * routed across regions.
 */

pub mod s3;
