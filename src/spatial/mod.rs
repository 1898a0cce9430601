pub mod octree;
